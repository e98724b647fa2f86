//! Slicing of row-major data arrays between selections.
//!
//! Data for a selection is laid out row-major: the last dimension of the
//! selection varies fastest. Projection maps every requested code to its
//! position in the source selection and walks the Cartesian product of those
//! positions, reading each cell at its precomputed flat offset.

use cubecache_core::error::{CubeError, Result};
use cubecache_core::selection::Selection;
use std::collections::HashMap;

/// Project `data`, laid out for `source`, onto `target`.
///
/// `target` must cover the same dimensions as `source` with codes drawn from
/// `source`; codes are emitted in `target`'s order, dimensions in `source`'s
/// order.
///
/// # Errors
///
/// Returns an invariant violation when `data` does not have one cell per
/// source cell, or when `target` is not a subset of `source`.
pub fn project<T: Clone>(source: &Selection, data: &[T], target: &Selection) -> Result<Vec<T>> {
    let expected = source.cell_count();
    if data.len() != expected {
        return Err(CubeError::invariant(format!(
            "data has {} cells but selection {} addresses {}",
            data.len(),
            source,
            expected
        )));
    }
    if target.len() != source.len() {
        return Err(CubeError::invariant(format!(
            "target selection {} does not cover the dimensions of {}",
            target, source
        )));
    }

    let dims = source.dimensions();

    let mut strides = vec![1usize; dims.len()];
    for i in (0..dims.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * dims[i + 1].values.len();
    }

    let mut indices: Vec<Vec<usize>> = Vec::with_capacity(dims.len());
    for dim in dims {
        let requested = target.codes(&dim.code).ok_or_else(|| {
            CubeError::invariant(format!("target selection lacks dimension '{}'", dim.code))
        })?;
        let positions: HashMap<&str, usize> = dim
            .values
            .iter()
            .enumerate()
            .map(|(i, code)| (code.as_str(), i))
            .collect();
        let mapped = requested
            .iter()
            .map(|code| {
                positions.get(code.as_str()).copied().ok_or_else(|| {
                    CubeError::invariant(format!(
                        "code '{}' of dimension '{}' is not in the source selection",
                        code, dim.code
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        indices.push(mapped);
    }

    let total: usize = indices.iter().map(Vec::len).product();
    let mut output = Vec::with_capacity(total);
    if total == 0 {
        return Ok(output);
    }

    // Odometer over the per-dimension index lists, last dimension fastest
    let mut counters = vec![0usize; dims.len()];
    loop {
        let offset: usize = counters
            .iter()
            .enumerate()
            .map(|(d, &c)| indices[d][c] * strides[d])
            .sum();
        output.push(data[offset].clone());

        let mut d = dims.len();
        loop {
            if d == 0 {
                return Ok(output);
            }
            d -= 1;
            counters[d] += 1;
            if counters[d] < indices[d].len() {
                break;
            }
            counters[d] = 0;
        }
    }
}
