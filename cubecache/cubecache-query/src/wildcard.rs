//! Glob-style matching of value codes.
//!
//! Patterns consist of literal characters, compared case-insensitively, and
//! `*`, which matches any run of characters including the empty one. A match
//! always covers the whole candidate.

/// Check whether `candidate` matches `pattern` in full.
pub fn is_match(candidate: &str, pattern: &str) -> bool {
    if pattern == "*" {
        return true;
    }

    let candidate = candidate.to_lowercase();
    let pattern = pattern.to_lowercase();

    if !pattern.contains('*') {
        return candidate == pattern;
    }

    let segments: Vec<&str> = pattern.split('*').collect();
    // split on a pattern containing '*' always yields at least two segments
    let prefix = segments[0];
    let suffix = segments[segments.len() - 1];

    let Some(rest) = candidate.strip_prefix(prefix) else {
        return false;
    };
    let Some(mut middle) = rest.strip_suffix(suffix) else {
        return false;
    };

    // Leftmost occurrence of each segment leaves the most room for the next one
    for segment in &segments[1..segments.len() - 1] {
        if segment.is_empty() {
            continue;
        }
        match middle.find(segment) {
            Some(pos) => middle = &middle[pos + segment.len()..],
            None => return false,
        }
    }

    true
}

/// True if `candidate` matches any of `patterns`.
pub fn matches_any<S: AsRef<str>>(candidate: &str, patterns: &[S]) -> bool {
    patterns.iter().any(|p| is_match(candidate, p.as_ref()))
}
