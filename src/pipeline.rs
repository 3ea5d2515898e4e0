//! Pipeline orchestration
//!
//! This module provides the public API for retention-flux.
//! It runs the whole flow from raw log JSON to dataset rows.

use crate::config::RetentionConfig;
use crate::corpus::{AllowList, Corpus, IngestReport};
use crate::dataset::{Dataset, DatasetView};
use crate::error::RetentionError;
use crate::schema::RecordAdapter;
use crate::types::Row;

/// Convert a JSON array of interaction logs into training rows (stateless, one-shot).
///
/// Uses the default sample period and smoothing weight.
///
/// # Example
/// ```ignore
/// let rows = logs_to_training_rows(logs_json)?;
/// ```
pub fn logs_to_training_rows(logs_json: String) -> Result<Vec<Row>, RetentionError> {
    let config = RetentionConfig::default();
    let (dataset, _) = build_dataset_from_json(&logs_json, DatasetView::Training, &config)?;
    Ok(dataset.rows)
}

/// Build any dataset view from a JSON array of interaction logs.
///
/// # Arguments
/// * `logs_json` - JSON array of `{user, item, timestamp, message}` records
/// * `view` - Rows to build for each entity
/// * `config` - Bucketing, smoothing and outlier parameters
///
/// # Returns
/// The dataset and the ingestion report of the parsed records
pub fn build_dataset_from_json(
    logs_json: &str,
    view: DatasetView,
    config: &RetentionConfig,
) -> Result<(Dataset, IngestReport), RetentionError> {
    // Stage 1: Parse the document into untyped records
    let records = RecordAdapter::parse_array(logs_json)?;

    // Stage 2: Validate and group
    let mut corpus = Corpus::with_config(config.clone());
    let report = corpus.add_records(&records, None);

    // Stage 3: Assemble rows
    let dataset = corpus.build_dataset(view)?;
    Ok((dataset, report))
}

/// Stateful processor accumulating logs across several documents.
///
/// Use this when the corpus arrives in more than one batch.
#[derive(Debug, Default)]
pub struct RetentionProcessor {
    corpus: Corpus,
    allow: Option<AllowList>,
}

impl RetentionProcessor {
    /// Create a processor with default parameters
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: RetentionConfig) -> Self {
        Self {
            corpus: Corpus::with_config(config),
            allow: None,
        }
    }

    /// Only keep logs of the listed users or entities from now on
    pub fn restrict_to(&mut self, allow: AllowList) {
        self.allow = Some(allow);
    }

    /// Ingest a JSON array of logs
    pub fn ingest_json(&mut self, json: &str) -> Result<IngestReport, RetentionError> {
        let records = RecordAdapter::parse_array(json)?;
        Ok(self.corpus.add_records(&records, self.allow.as_ref()))
    }

    /// Ingest newline-delimited logs
    pub fn ingest_ndjson(&mut self, ndjson: &str) -> Result<IngestReport, RetentionError> {
        let records = RecordAdapter::parse_ndjson(ndjson)?;
        Ok(self.corpus.add_records(&records, self.allow.as_ref()))
    }

    pub fn build(&self, view: DatasetView) -> Result<Dataset, RetentionError> {
        self.corpus.build_dataset(view)
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    /// Save the current parameters as JSON
    pub fn save_config(&self) -> Result<String, RetentionError> {
        Ok(self.corpus.config().to_json()?)
    }

    /// Replace the parameters; logs already ingested are kept
    pub fn load_config(&mut self, json: &str) -> Result<(), RetentionError> {
        let config = RetentionConfig::from_json(json)?;
        let mut corpus = Corpus::with_config(config);
        corpus.add_events(std::mem::take(&mut self.corpus).into_events());
        self.corpus = corpus;
        Ok(())
    }

    /// Number of logs accepted so far
    pub fn event_count(&self) -> usize {
        self.corpus.len()
    }
}
