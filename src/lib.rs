//! retention-flux - Batch engine for vocabulary retention datasets
//!
//! retention-flux turns an unordered log of learner interactions into tabular
//! datasets describing how well each word is remembered over time:
//! record validation → per-entity feature state → bucketed recall scores
//! → gap filling and smoothing → supervised rows.
//!
//! ## Modules
//!
//! - **Schema**: raw log records, message kinds and entity identity
//! - **Partitions / Snapshot**: incremental feature reducers per interaction kind
//! - **Builder / Curve**: per-entity retention curve inference and row construction
//! - **Corpus / Dataset**: multi-entity orchestration, outlier filtering and views

pub mod builder;
pub mod config;
pub mod corpus;
pub mod curve;
pub mod dataset;
pub mod error;
pub mod partitions;
pub mod pipeline;
pub mod schema;
pub mod snapshot;
pub mod types;

pub use builder::EntityBuilder;
pub use config::{RetentionConfig, NEVER, OUTLIERS_COEFFICIENT};
pub use corpus::{AllowList, Corpus, IngestReport, MessageSequence};
pub use curve::RetentionCurve;
pub use dataset::{AssemblyReport, Dataset, DatasetView};
pub use error::RetentionError;
pub use pipeline::{build_dataset_from_json, logs_to_training_rows, RetentionProcessor};
pub use snapshot::FeatureSnapshot;
pub use types::{Elapsed, FeatureValue, PlottingRow, Projection, Row, TrainingRow};

// Schema exports
pub use schema::{
    ClickCounting, EntityId, Event, Message, RawRecord, RecordAdapter, ValidationError,
};

/// Crate version reported by the CLI
pub const FLUX_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by the CLI
pub const PRODUCER_NAME: &str = "retention-flux";
