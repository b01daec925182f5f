// src/batch.rs
//! Element-wise distances over two batches of sequences with recycling.
//!
//! The output has `max(len_a, len_b)` slots; slot `k` pairs `a[k % len_a]`
//! with `b[k % len_b]`. A missing element on either side makes the slot
//! missing without running the engine. Ceiling hits stay in the output as
//! [`CEILING_EXCEEDED`](crate::damerau::CEILING_EXCEEDED).

use std::ops::Range;

use tracing::debug;

use crate::damerau::{bounded_distance_with, DistanceScratch, EditWeights, CEILING_EXCEEDED};
use crate::error::{DistanceError, Result};

/// Lengths of the two input batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchShape {
    pub len_a: usize,
    pub len_b: usize,
}

impl BatchShape {
    pub fn new(len_a: usize, len_b: usize) -> Result<Self> {
        if len_a == 0 {
            return Err(DistanceError::EmptyBatch { side: "source" });
        }
        if len_b == 0 {
            return Err(DistanceError::EmptyBatch { side: "target" });
        }
        Ok(BatchShape { len_a, len_b })
    }

    pub fn output_len(&self) -> usize {
        self.len_a.max(self.len_b)
    }

    pub fn indices(&self, k: usize) -> (usize, usize) {
        recycled_indices(k, self.len_a, self.len_b)
    }

    /// False when the shorter batch is cut off part-way through its last cycle.
    pub fn recycles_evenly(&self) -> bool {
        let n = self.output_len();
        n % self.len_a == 0 && n % self.len_b == 0
    }
}

/// Source and target positions feeding output slot `k`.
#[inline]
pub fn recycled_indices(k: usize, len_a: usize, len_b: usize) -> (usize, usize) {
    (k % len_a, k % len_b)
}

pub fn validate_max_distance(max_distance: f64) -> Result<f64> {
    if max_distance.is_finite() && max_distance >= 0.0 {
        Ok(max_distance)
    } else {
        Err(DistanceError::InvalidMaxDistance(max_distance))
    }
}

#[inline]
fn slot<S: AsRef<[u32]>>(
    scratch: &mut DistanceScratch,
    a: &[Option<S>],
    b: &[Option<S>],
    shape: BatchShape,
    k: usize,
    weights: &EditWeights,
    max_distance: f64,
) -> Option<f64> {
    let (i, j) = shape.indices(k);
    match (&a[i], &b[j]) {
        (Some(src), Some(tgt)) => Some(
            bounded_distance_with(scratch, src.as_ref(), tgt.as_ref(), weights, max_distance)
                .unwrap_or(CEILING_EXCEEDED),
        ),
        _ => None,
    }
}

/// Computes output slots `range` only. `range` must lie within the batch's
/// output length.
pub fn compute_range<S: AsRef<[u32]>>(
    a: &[Option<S>],
    b: &[Option<S>],
    weights: &EditWeights,
    max_distance: f64,
    range: Range<usize>,
) -> Result<Vec<Option<f64>>> {
    let shape = BatchShape::new(a.len(), b.len())?;
    let max_distance = validate_max_distance(max_distance)?;
    let mut scratch = DistanceScratch::new();
    Ok(range
        .map(|k| slot(&mut scratch, a, b, shape, k, weights, max_distance))
        .collect())
}

/// Sequential batch evaluation; `None` slots are missing.
pub fn compute_batch<S: AsRef<[u32]>>(
    a: &[Option<S>],
    b: &[Option<S>],
    weights: &EditWeights,
    max_distance: f64,
) -> Result<Vec<Option<f64>>> {
    let shape = BatchShape::new(a.len(), b.len())?;
    debug!(len_a = shape.len_a, len_b = shape.len_b, max_distance, "computing batch");
    compute_range(a, b, weights, max_distance, 0..shape.output_len())
}

/// Same result as [`compute_batch`], with slots spread over the rayon pool.
#[cfg(not(target_arch = "wasm32"))]
pub fn compute_batch_par<S: AsRef<[u32]> + Sync>(
    a: &[Option<S>],
    b: &[Option<S>],
    weights: &EditWeights,
    max_distance: f64,
) -> Result<Vec<Option<f64>>> {
    use rayon::prelude::*;

    let shape = BatchShape::new(a.len(), b.len())?;
    let max_distance = validate_max_distance(max_distance)?;
    debug!(len_a = shape.len_a, len_b = shape.len_b, max_distance, "computing batch in parallel");
    Ok((0..shape.output_len())
        .into_par_iter()
        .map_init(DistanceScratch::new, |scratch, k| {
            slot(scratch, a, b, shape, k, weights, max_distance)
        })
        .collect())
}
