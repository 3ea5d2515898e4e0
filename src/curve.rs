//! Retention curve inference
//!
//! Bucket recall scores are noisy and have holes. The curve is recovered in
//! two passes: gaps are filled (interpolation inside, forward fill at the end,
//! a zero seed at the start), then the series is smoothed with an exponential
//! moving average run forward and then backward.

use serde::Serialize;
use std::ops::Range;

/// Lower clip applied before the memory-trace transform
pub const MEMORY_TRACE_MIN_RECALL: f64 = 0.25;
/// Upper clip applied before the memory-trace transform
pub const MEMORY_TRACE_MAX_RECALL: f64 = 0.75;

/// Recall score of a bucket, `None` when nothing was scored in it
pub fn recall_score(recalls: u32, clicks: u32) -> Option<f64> {
    if recalls + clicks == 0 {
        return None;
    }
    let root = f64::from(recalls).sqrt();
    Some(root / (root + f64::from(clicks)))
}

/// Maximal runs of unknown values, in index order
pub fn find_gaps(values: &[Option<f64>]) -> Vec<Range<usize>> {
    let mut gaps = Vec::new();
    let mut start = None;

    for (i, value) in values.iter().enumerate() {
        match (value, start) {
            (None, None) => start = Some(i),
            (Some(_), Some(s)) => {
                gaps.push(s..i);
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        gaps.push(s..values.len());
    }

    gaps
}

pub fn linear_interpolation(y0: f64, y1: f64, t: f64) -> f64 {
    y0 * (1.0 - t) + y1 * t
}

/// Fill every unknown value. Returns `None` when no value is known.
pub fn fill_gaps(values: &[Option<f64>]) -> Option<Vec<f64>> {
    if values.iter().all(Option::is_none) {
        return None;
    }

    let mut filled: Vec<f64> = values.iter().map(|v| v.unwrap_or(0.0)).collect();

    for gap in find_gaps(values) {
        let before = gap.start.checked_sub(1);
        let after = (gap.end < values.len()).then_some(gap.end);

        match (before, after) {
            (Some(b), Some(a)) => interpolate(&mut filled, b, a),
            (Some(b), None) => {
                let last = filled[b];
                filled[gap].iter_mut().for_each(|v| *v = last);
            }
            // Leading gap: the learner starts from zero knowledge
            (None, Some(a)) => {
                filled[0] = 0.0;
                interpolate(&mut filled, 0, a);
            }
            // Excluded by the all-unknown check above
            (None, None) => {}
        }
    }

    Some(filled)
}

/// Interpolate strictly between two anchor indices
fn interpolate(values: &mut [f64], from: usize, to: usize) {
    let (y0, y1) = (values[from], values[to]);
    let span = (to - from) as f64;
    for k in from + 1..to {
        let t = (k - from) as f64 / span;
        values[k] = linear_interpolation(y0, y1, t);
    }
}

/// `avg[0] = x[0]`, `avg[i] = (1 - alpha) * x[i] + alpha * avg[i - 1]`
pub fn forward_ema(values: &[f64], alpha: f64) -> Vec<f64> {
    let mut averaged = Vec::with_capacity(values.len());
    for (i, &x) in values.iter().enumerate() {
        let value = match i {
            0 => x,
            _ => (1.0 - alpha) * x + alpha * averaged[i - 1],
        };
        averaged.push(value);
    }
    averaged
}

/// `avg[n-1] = x[n-1]`, `avg[i] = (1 - alpha) * x[i] + alpha * avg[i + 1]` down to index 0
pub fn backward_ema(values: &[f64], alpha: f64) -> Vec<f64> {
    let mut averaged = values.to_vec();
    for i in (0..values.len().saturating_sub(1)).rev() {
        averaged[i] = (1.0 - alpha) * values[i] + alpha * averaged[i + 1];
    }
    averaged
}

/// Forward EMA followed by a backward EMA over its output
pub fn smooth_bidirectional(values: &[f64], alpha: f64) -> Vec<f64> {
    backward_ema(&forward_ema(values, alpha), alpha)
}

/// Memory-trace strength implied by recalling with probability `recall` after `delta` seconds
pub fn memory_trace(recall: f64, delta: i64) -> f64 {
    let clipped = recall.clamp(MEMORY_TRACE_MIN_RECALL, MEMORY_TRACE_MAX_RECALL);
    -(delta as f64).sqrt() / clipped.ln()
}

/// Inferred retention of one entity, one entry per bucket
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetentionCurve {
    /// Normalized end time of each bucket
    pub bucket_ends: Vec<i64>,
    /// Raw recall score, `None` for buckets without a scored event
    pub recall_scores: Vec<Option<f64>>,
    /// Recall scores with every gap filled
    pub filled: Vec<f64>,
    /// Smoothed curve
    pub inferred: Vec<f64>,
}

impl RetentionCurve {
    pub fn from_scores(
        bucket_ends: Vec<i64>,
        recall_scores: Vec<Option<f64>>,
        alpha: f64,
    ) -> Option<Self> {
        let filled = fill_gaps(&recall_scores)?;
        let inferred = smooth_bidirectional(&filled, alpha);
        Some(Self {
            bucket_ends,
            recall_scores,
            filled,
            inferred,
        })
    }

    pub fn len(&self) -> usize {
        self.inferred.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inferred.is_empty()
    }
}
