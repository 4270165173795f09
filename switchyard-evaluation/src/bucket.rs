//! Bucket-range construction and variation selection.
//!
//! A hash value in `[0, 1)` is mapped to a variation index through a list of
//! half-open ranges built from traffic coverage and per-variation weights.

use serde::{Deserialize, Serialize};

use crate::hash::hash;

/// A half-open `[start, end)` slice of the hash space.
///
/// Serializes as a two-element JSON array, matching the wire form used by
/// feature definition payloads.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BucketRange(pub f64, pub f64);

impl BucketRange {
    pub fn start(&self) -> f64 {
        self.0
    }

    pub fn end(&self) -> f64 {
        self.1
    }
}

/// A mutual-exclusion namespace: experiments sharing a namespace id split
/// the `[0, 1)` hash space into non-overlapping sub-ranges.
///
/// Serializes as `[id, start, end]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Namespace(pub String, pub f64, pub f64);

impl Namespace {
    pub fn id(&self) -> &str {
        &self.0
    }
}

/// Whether `n` falls inside the half-open range.
pub fn in_range(n: f64, range: &BucketRange) -> bool {
    n >= range.0 && n < range.1
}

/// Equal weights for `num_variations` arms; empty when below 1.
pub fn get_equal_weights(num_variations: usize) -> Vec<f64> {
    if num_variations < 1 {
        return Vec::new();
    }
    vec![1.0 / num_variations as f64; num_variations]
}

/// Build bucket ranges for an experiment.
///
/// Coverage is clamped to `[0, 1]`. Weights are replaced by equal weights
/// when absent, of the wrong length, or summing outside `[0.99, 1.01]`.
/// Range `i` spans `[cum, cum + coverage * weight_i)` where `cum` advances
/// by the full (uncovered) weight, so the covered span of each arm sits at
/// the low end of that arm's slice and the total covered width equals
/// `coverage`.
pub fn get_bucket_ranges(
    num_variations: usize,
    coverage: f64,
    weights: Option<&[f64]>,
) -> Vec<BucketRange> {
    let coverage = coverage.clamp(0.0, 1.0);

    let weights: Vec<f64> = match weights {
        Some(w) if w.len() == num_variations && (0.99..=1.01).contains(&w.iter().sum::<f64>()) => {
            w.to_vec()
        }
        _ => get_equal_weights(num_variations),
    };

    let mut cumulative = 0.0;
    weights
        .iter()
        .map(|weight| {
            let start = cumulative;
            cumulative += weight;
            BucketRange(start, start + coverage * weight)
        })
        .collect()
}

/// Index of the first range containing `n`, or -1 when none does.
///
/// With coverage below 1 every arm has an uncovered tail, so -1 here means
/// "evaluated but outside the covered span", distinct from being excluded
/// by an upstream gate.
pub fn choose_variation(n: f64, ranges: &[BucketRange]) -> i32 {
    for (index, range) in ranges.iter().enumerate() {
        if in_range(n, range) {
            return index as i32;
        }
    }
    -1
}

/// Whether a user id falls inside a namespace's sub-range.
///
/// Uses the version-1 hash with the namespace id prefixed by `__` as seed,
/// so namespace membership is independent of any experiment's own seed.
pub fn in_namespace(user_id: &str, namespace: &Namespace) -> bool {
    match hash(&format!("__{}", namespace.0), user_id, 1) {
        Some(n) => n >= namespace.1 && n < namespace.2,
        None => false,
    }
}
