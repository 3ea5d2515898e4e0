//! Corpus orchestration
//!
//! The corpus owns every accepted event, groups them into one
//! [`EntityBuilder`] per user/item pair, drops entities with an outlying
//! number of events and concatenates the rows of the rest.

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

use crate::builder::EntityBuilder;
use crate::config::RetentionConfig;
use crate::dataset::{AssemblyReport, Dataset, DatasetView};
use crate::error::RetentionError;
use crate::schema::{EntityId, Event, Interaction, RecordRejection};
use crate::types::{Row, TrainingRow};

/// Restricts ingestion to a set of users or user/item pairs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowList {
    Users(BTreeSet<String>),
    Entities(BTreeSet<EntityId>),
}

impl AllowList {
    pub fn users<I, S>(users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AllowList::Users(users.into_iter().map(Into::into).collect())
    }

    pub fn allows(&self, entity: &EntityId) -> bool {
        match self {
            AllowList::Users(users) => users.contains(&entity.user),
            AllowList::Entities(entities) => entities.contains(entity),
        }
    }
}

/// Outcome of one ingestion batch
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestReport {
    pub accepted: usize,
    pub rejected: Vec<RecordRejection>,
    /// Valid records outside the allow-list
    pub excluded: usize,
    /// Earliest accepted timestamp, read as Unix seconds
    pub earliest: Option<DateTime<Utc>>,
    /// Latest accepted timestamp, read as Unix seconds
    pub latest: Option<DateTime<Utc>>,
}

impl IngestReport {
    pub fn total(&self) -> usize {
        self.accepted + self.rejected.len() + self.excluded
    }
}

/// Sorted, normalized messages of one entity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageSequence {
    pub entity: EntityId,
    pub messages: Vec<Interaction>,
}

/// Keep items whose length lies strictly within `coefficient` sample
/// standard deviations of the mean. A single item is always kept.
pub fn filter_outliers<T>(items: Vec<T>, coefficient: f64, len: impl Fn(&T) -> usize) -> Vec<T> {
    if items.len() <= 1 {
        return items;
    }

    let lengths: Vec<f64> = items.iter().map(|item| len(item) as f64).collect();
    let n = lengths.len() as f64;
    let mean = lengths.iter().sum::<f64>() / n;
    let variance = lengths.iter().map(|l| (l - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let std_dev = variance.sqrt();

    let lower = mean - coefficient * std_dev;
    let upper = mean + coefficient * std_dev;

    items
        .into_iter()
        .zip(lengths)
        .filter(|(_, l)| lower < *l && *l < upper)
        .map(|(item, _)| item)
        .collect()
}

/// A closed batch of interaction events
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    config: RetentionConfig,
    events: Vec<Event>,
}

impl Corpus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: RetentionConfig) -> Self {
        Self {
            config,
            events: Vec::new(),
        }
    }

    pub fn config(&self) -> &RetentionConfig {
        &self.config
    }

    /// Number of accepted events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Validate and keep records; failures are reported, never fatal
    pub fn add_records(&mut self, records: &[Value], allow: Option<&AllowList>) -> IngestReport {
        let mut report = IngestReport::default();
        let mut span: Option<(i64, i64)> = None;

        for (index, record) in records.iter().enumerate() {
            let event = match Event::from_value(record) {
                Ok(event) => event,
                Err(error) => {
                    tracing::debug!(index, %error, "rejected record");
                    report.rejected.push(RecordRejection::new(index, record, error));
                    continue;
                }
            };

            if allow.is_some_and(|list| !list.allows(&event.entity)) {
                tracing::debug!(index, entity = %event.entity, "excluded record");
                report.excluded += 1;
                continue;
            }

            let t = event.timestamp();
            span = Some(match span {
                Some((lo, hi)) => (lo.min(t), hi.max(t)),
                None => (t, t),
            });
            report.accepted += 1;
            self.events.push(event);
        }

        if let Some((lo, hi)) = span {
            report.earliest = Utc.timestamp_opt(lo, 0).single();
            report.latest = Utc.timestamp_opt(hi, 0).single();
        }

        tracing::info!(
            accepted = report.accepted,
            rejected = report.rejected.len(),
            excluded = report.excluded,
            "ingested records"
        );
        report
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events
    }

    /// Keep already validated events
    pub fn add_events<I: IntoIterator<Item = Event>>(&mut self, events: I) {
        self.events.extend(events);
    }

    /// One builder per entity, in first-seen order
    fn make_builders(&self) -> Result<Vec<EntityBuilder>, RetentionError> {
        if self.events.len() < 2 {
            return Err(RetentionError::InsufficientData(format!(
                "need at least two events to build a dataset, have {}",
                self.events.len()
            )));
        }

        let mut index: HashMap<&EntityId, usize> = HashMap::new();
        let mut builders: Vec<EntityBuilder> = Vec::new();
        for event in &self.events {
            match index.get(&event.entity) {
                Some(&i) => builders[i].add(event.clone())?,
                None => {
                    index.insert(&event.entity, builders.len());
                    builders.push(EntityBuilder::from_event(event.clone())?);
                }
            }
        }
        Ok(builders)
    }

    /// Builders left after the outlier filter, and how many were dropped
    pub fn builders(&self) -> Result<(Vec<EntityBuilder>, usize), RetentionError> {
        let builders = self.make_builders()?;
        let total = builders.len();
        let retained =
            filter_outliers(builders, self.config.outliers_coefficient, EntityBuilder::len);
        let removed = total - retained.len();
        Ok((retained, removed))
    }

    /// Build `view` for every retained entity and concatenate the rows
    pub fn build_dataset(&self, view: DatasetView) -> Result<Dataset, RetentionError> {
        self.config.validate()?;
        view.validate()?;

        let (builders, outliers_removed) = self.builders()?;
        let mut report = AssemblyReport {
            entities: builders.len() + outliers_removed,
            outliers_removed,
            ..AssemblyReport::default()
        };

        let mut rows = Vec::new();
        for (builder, result) in builders.iter().zip(self.evaluate(&builders, view)) {
            match result {
                Ok(entity_rows) => rows.extend(entity_rows),
                Err(e) if e.is_insufficient_data() => {
                    tracing::debug!(entity = %builder.entity(), error = %e, "skipping entity");
                    report.insufficient_data += 1;
                }
                Err(e) => return Err(e),
            }
        }
        report.rows = rows.len();

        tracing::info!(
            entities = report.entities,
            outliers_removed = report.outliers_removed,
            insufficient_data = report.insufficient_data,
            rows = report.rows,
            "assembled dataset"
        );
        Ok(Dataset { rows, report })
    }

    #[cfg(not(feature = "parallel"))]
    fn evaluate(
        &self,
        builders: &[EntityBuilder],
        view: DatasetView,
    ) -> Vec<Result<Vec<Row>, RetentionError>> {
        builders
            .iter()
            .map(|builder| view.rows_for(builder, &self.config))
            .collect()
    }

    #[cfg(feature = "parallel")]
    fn evaluate(
        &self,
        builders: &[EntityBuilder],
        view: DatasetView,
    ) -> Vec<Result<Vec<Row>, RetentionError>> {
        use rayon::prelude::*;

        builders
            .par_iter()
            .map(|builder| view.rows_for(builder, &self.config))
            .collect()
    }

    /// Sorted, normalized messages of every retained entity
    pub fn message_sequences(&self) -> Result<Vec<MessageSequence>, RetentionError> {
        let (builders, _) = self.builders()?;
        Ok(builders
            .iter()
            .map(|builder| MessageSequence {
                entity: builder.entity().clone(),
                messages: builder.message_sequence(),
            })
            .collect())
    }

    /// Every prefix of every retained entity's training rows, for sequence models
    pub fn training_prefixes(&self) -> Result<Vec<Vec<Row>>, RetentionError> {
        self.config.validate()?;
        let (builders, _) = self.builders()?;

        let mut prefixes = Vec::new();
        for builder in &builders {
            let rows: Vec<Row> = match builder
                .build_training_rows(self.config.sample_period_secs, self.config.alpha)
            {
                Ok(rows) => rows.into_iter().map(TrainingRow::into_row).collect(),
                Err(e) if e.is_insufficient_data() => continue,
                Err(e) => return Err(e),
            };
            for end in 1..=rows.len() {
                prefixes.push(rows[..end].to_vec());
            }
        }
        Ok(prefixes)
    }
}
