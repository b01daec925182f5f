// src/damerau.rs
//! Weighted restricted Damerau-Levenshtein distance over integer symbols.
//!
//! The table is the Lowrance-Wagner layout: one extra row and column in front
//! of the usual edit-distance table so a transposition can look back to the
//! cell before the swapped pair. A per-call last-seen index maps each source
//! symbol to the latest row it occurred in, which keeps the look-back O(1).

use ahash::AHashMap;
use tracing::trace;

use crate::error::{DistanceError, Result};

/// Host-facing result for a pair whose distance exceeds the ceiling.
pub const CEILING_EXCEEDED: f64 = -1.0;

/// Costs of the four edit operations.
///
/// Only constructible through validating constructors, so every value holds
/// finite, non-negative weights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EditWeights {
    deletion: f64,
    insertion: f64,
    substitution: f64,
    transposition: f64,
}

impl EditWeights {
    pub fn new(deletion: f64, insertion: f64, substitution: f64, transposition: f64) -> Result<Self> {
        let named = [
            ("deletion", deletion),
            ("insertion", insertion),
            ("substitution", substitution),
            ("transposition", transposition),
        ];
        for (operation, value) in named {
            if !value.is_finite() || value < 0.0 {
                return Err(DistanceError::InvalidWeight { operation, value });
            }
        }
        Ok(EditWeights { deletion, insertion, substitution, transposition })
    }

    /// Reads weights in the fixed order deletion, insertion, substitution, transposition.
    pub fn from_slice(weights: &[f64]) -> Result<Self> {
        match *weights {
            [d, i, s, t] => Self::new(d, i, s, t),
            _ => Err(DistanceError::WeightCount(weights.len())),
        }
    }

    pub fn scaled(&self, factor: f64) -> Result<Self> {
        Self::new(
            self.deletion * factor,
            self.insertion * factor,
            self.substitution * factor,
            self.transposition * factor,
        )
    }

    pub fn deletion(&self) -> f64 { self.deletion }
    pub fn insertion(&self) -> f64 { self.insertion }
    pub fn substitution(&self) -> f64 { self.substitution }
    pub fn transposition(&self) -> f64 { self.transposition }

    pub fn to_array(&self) -> [f64; 4] {
        [self.deletion, self.insertion, self.substitution, self.transposition]
    }
}

impl Default for EditWeights {
    fn default() -> Self {
        EditWeights { deletion: 1.0, insertion: 1.0, substitution: 1.0, transposition: 1.0 }
    }
}

/// Working memory for one distance call: the flat score table plus the
/// last-seen index and row minima that go with it.
///
/// Each call resets both before use, so a scratch carried across a batch only
/// saves allocations; no scores or positions leak from one pair to the next.
#[derive(Debug, Default)]
pub struct DistanceScratch {
    scores: Vec<f64>,
    cols: usize,
    last_seen: AHashMap<u32, usize>,
    row_mins: Vec<f64>,
}

impl DistanceScratch {
    pub fn new() -> Self {
        Self::default()
    }

    fn reset(&mut self, rows: usize, cols: usize, fill: f64) {
        self.scores.clear();
        self.scores.resize(rows * cols, fill);
        self.cols = cols;
        self.last_seen.clear();
        self.row_mins.clear();
    }

    #[inline]
    fn at(&self, row: usize, col: usize) -> f64 {
        self.scores[row * self.cols + col]
    }

    #[inline]
    fn set(&mut self, row: usize, col: usize, value: f64) {
        self.scores[row * self.cols + col] = value;
    }
}

#[inline]
fn within_ceiling(score: f64, max_distance: f64) -> Option<f64> {
    if max_distance != 0.0 && score > max_distance {
        None
    } else {
        Some(score)
    }
}

/// Cheapest start for a transposition that lands below row `i + 1`, skipping
/// it. Rows more than `max_distance` back cost more than the ceiling in
/// skipped symbols alone and are left out.
fn jump_floor(row_mins: &[f64], i: usize, max_distance: f64) -> f64 {
    let first = i.saturating_sub(max_distance as usize).max(1);
    (first..=i)
        .map(|k| row_mins[k] + (i - k) as f64)
        .fold(f64::INFINITY, f64::min)
}

/// Distance between `src` and `tgt`, or `None` once it provably exceeds
/// `max_distance`. A `max_distance` of 0 means no ceiling.
///
/// An empty side yields the plain length of the other side, without weights.
pub fn bounded_distance_with(
    scratch: &mut DistanceScratch,
    src: &[u32],
    tgt: &[u32],
    weights: &EditWeights,
    max_distance: f64,
) -> Option<f64> {
    let (x, y) = (src.len(), tgt.len());
    if x == 0 || y == 0 {
        return within_ceiling((x + y) as f64, max_distance);
    }

    let score_ceil = (x + y) as f64;
    scratch.reset(x + 2, y + 2, score_ceil);
    for i in 0..=x {
        scratch.set(i + 1, 1, i as f64);
    }
    for j in 0..=y {
        scratch.set(1, j + 1, j as f64);
    }

    let bounded = max_distance != 0.0;
    // Smallest score per filled row, used to bound the final score from below.
    scratch.row_mins.extend([score_ceil, 0.0]);

    for i in 1..=x {
        let mut last_match_col = 0;
        let mut row_min = i as f64;

        for j in 1..=y {
            let match_row = scratch.last_seen.get(&tgt[j - 1]).copied().unwrap_or(0);
            let swap_score = scratch.at(match_row, last_match_col)
                + (i - match_row - 1) as f64
                + (j - last_match_col - 1) as f64
                + weights.transposition;

            let score = if src[i - 1] != tgt[j - 1] {
                let sub_score = scratch.at(i, j) + weights.substitution;
                let ins_score = scratch.at(i + 1, j) + weights.insertion;
                let del_score = scratch.at(i, j + 1) + weights.deletion;
                swap_score.min(del_score.min(ins_score).min(sub_score))
            } else {
                last_match_col = j;
                scratch.at(i, j).min(swap_score)
            };
            scratch.set(i + 1, j + 1, score);
            row_min = row_min.min(score);
        }

        if bounded
            && row_min > max_distance
            && jump_floor(&scratch.row_mins, i, max_distance) + weights.transposition > max_distance
        {
            trace!(row = i, rows = x, max_distance, "distance ceiling exceeded");
            return None;
        }

        scratch.last_seen.insert(src[i - 1], i);
        scratch.row_mins.push(row_min);
    }

    within_ceiling(scratch.at(x + 1, y + 1), max_distance)
}

pub fn bounded_distance(src: &[u32], tgt: &[u32], weights: &EditWeights, max_distance: f64) -> Option<f64> {
    bounded_distance_with(&mut DistanceScratch::new(), src, tgt, weights, max_distance)
}

/// Host form of [`bounded_distance`]: [`CEILING_EXCEEDED`] stands in for `None`.
pub fn distance(src: &[u32], tgt: &[u32], weights: &EditWeights, max_distance: f64) -> f64 {
    bounded_distance(src, tgt, weights, max_distance).unwrap_or(CEILING_EXCEEDED)
}
