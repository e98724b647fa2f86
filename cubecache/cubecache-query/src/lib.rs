//! Selection resolution and projection for cubecache.
//!
//! - [`wildcard`]: case-insensitive `*` patterns over value codes
//! - [`filter`]: per-dimension filters and the default selection policy
//! - [`projection`]: slicing row-major data arrays down to a narrower selection

pub mod filter;
pub mod projection;
pub mod wildcard;

pub use filter::{apply_chain, Filter, SelectionResolver};
pub use projection::project;
pub use wildcard::{is_match, matches_any};
