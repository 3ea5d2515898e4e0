//! Core data types for retention datasets
//!
//! Rows are flat mappings from feature name to value so that every dataset
//! view can be concatenated into one table regardless of its column subset.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::config::NEVER;

/// Seconds elapsed since some sub-event, or `Never` if it has not occurred yet.
///
/// `Never` sorts after every real duration, so the minimum across sub-kinds
/// is a real duration whenever one exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Elapsed {
    Seconds(i64),
    #[default]
    Never,
}

impl Elapsed {
    /// Elapsed time at `now` since `since`, if it ever happened
    pub fn since(now: i64, since: Option<i64>) -> Self {
        match since {
            Some(t) => Elapsed::Seconds(now - t),
            None => Elapsed::Never,
        }
    }

    pub fn seconds(&self) -> Option<i64> {
        match self {
            Elapsed::Seconds(s) => Some(*s),
            Elapsed::Never => None,
        }
    }

    /// Value written to datasets: `Never` becomes the [`NEVER`] constant
    pub fn as_feature(&self) -> i64 {
        self.seconds().unwrap_or(NEVER)
    }
}

impl PartialOrd for Elapsed {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Elapsed {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Elapsed::Seconds(a), Elapsed::Seconds(b)) => a.cmp(b),
            (Elapsed::Seconds(_), Elapsed::Never) => Ordering::Less,
            (Elapsed::Never, Elapsed::Seconds(_)) => Ordering::Greater,
            (Elapsed::Never, Elapsed::Never) => Ordering::Equal,
        }
    }
}

/// A single cell of a dataset row
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl FeatureValue {
    pub fn as_f64(&self) -> f64 {
        match self {
            FeatureValue::Bool(b) => f64::from(u8::from(*b)),
            FeatureValue::Int(i) => *i as f64,
            FeatureValue::Float(f) => *f,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FeatureValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FeatureValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<bool> for FeatureValue {
    fn from(v: bool) -> Self {
        FeatureValue::Bool(v)
    }
}

impl From<i64> for FeatureValue {
    fn from(v: i64) -> Self {
        FeatureValue::Int(v)
    }
}

impl From<u32> for FeatureValue {
    fn from(v: u32) -> Self {
        FeatureValue::Int(i64::from(v))
    }
}

impl From<f64> for FeatureValue {
    fn from(v: f64) -> Self {
        FeatureValue::Float(v)
    }
}

impl From<Elapsed> for FeatureValue {
    fn from(v: Elapsed) -> Self {
        FeatureValue::Int(v.as_feature())
    }
}

/// One dataset row: feature name to value, ordered by name
pub type Row = BTreeMap<&'static str, FeatureValue>;

/// Column name of the seconds-to-target feature
pub const DELTA: &str = "delta";
/// Column name of the training target
pub const INFERRED_RETENTION_RATE: &str = "inferred_retention_rate";
/// Column name of the leakage-safe recall score of the source bucket
pub const PREVIOUS_RECALL_SCORE: &str = "previous_recall_score";

/// Column subsets exposed by a feature snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Projection {
    /// Click flag and first-exposure time only
    Common,
    /// Common plus reading features
    Reading,
    /// Common plus revision features
    Revision,
    /// Every feature of every partition
    #[default]
    All,
}

impl Projection {
    pub fn includes_reading(&self) -> bool {
        matches!(self, Projection::Reading | Projection::All)
    }

    pub fn includes_revision(&self) -> bool {
        matches!(self, Projection::Revision | Projection::All)
    }

    pub fn includes_aggregates(&self) -> bool {
        matches!(self, Projection::All)
    }
}

/// Supervised row: features at a bucket and the retention target after `delta` seconds
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingRow {
    #[serde(flatten)]
    pub features: Row,
    /// Seconds between the source bucket and the target bucket
    pub delta: i64,
    /// Smoothed retention curve at the target bucket
    pub inferred_retention_rate: f64,
    /// Raw recall score of the source bucket
    pub previous_recall_score: f64,
}

impl TrainingRow {
    pub fn into_row(self) -> Row {
        let mut row = self.features;
        row.insert(DELTA, self.delta.into());
        row.insert(INFERRED_RETENTION_RATE, self.inferred_retention_rate.into());
        row.insert(PREVIOUS_RECALL_SCORE, self.previous_recall_score.into());
        row
    }
}

/// Visualization row: the latest snapshot `delta` seconds after it was taken
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlottingRow {
    #[serde(flatten)]
    pub features: Row,
    pub delta: i64,
}

impl PlottingRow {
    pub fn into_row(self) -> Row {
        let mut row = self.features;
        row.insert(DELTA, self.delta.into());
        row
    }
}
