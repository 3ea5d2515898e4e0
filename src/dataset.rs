//! Dataset views and assembled tables

use serde::Serialize;
use std::collections::BTreeSet;

use crate::builder::EntityBuilder;
use crate::config::{validate_plotting_params, RetentionConfig};
use crate::error::RetentionError;
use crate::schema::ClickCounting;
use crate::types::{PlottingRow, Projection, Row, TrainingRow};

/// Which rows to build for each entity
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DatasetView {
    /// Bucketed supervised rows targeting the inferred retention rate
    #[default]
    Training,
    /// One labeled row per outcome-carrying event
    Events {
        projection: Projection,
        counting: ClickCounting,
    },
    /// One row per entity with its features after every event
    Flattened { projection: Projection },
    /// Unlabeled rows sampled at a fixed interval, for drawing curves
    Plotting { interval: i64, tail_padding: i64 },
}

impl DatasetView {
    /// Plotting view with the configured spacing and padding
    pub fn plotting(config: &RetentionConfig) -> Self {
        DatasetView::Plotting {
            interval: config.plot_interval_secs,
            tail_padding: config.tail_padding_secs,
        }
    }

    pub fn validate(&self) -> Result<(), RetentionError> {
        match *self {
            DatasetView::Plotting {
                interval,
                tail_padding,
            } => validate_plotting_params(interval, tail_padding),
            _ => Ok(()),
        }
    }

    /// Rows this view produces for one entity
    pub fn rows_for(
        &self,
        builder: &EntityBuilder,
        config: &RetentionConfig,
    ) -> Result<Vec<Row>, RetentionError> {
        match *self {
            DatasetView::Training => Ok(builder
                .build_training_rows(config.sample_period_secs, config.alpha)?
                .into_iter()
                .map(TrainingRow::into_row)
                .collect()),
            DatasetView::Events {
                projection,
                counting,
            } => builder.build_event_rows(projection, counting),
            DatasetView::Flattened { projection } => {
                Ok(vec![builder.build_final_snapshot(projection)?])
            }
            DatasetView::Plotting {
                interval,
                tail_padding,
            } => Ok(builder
                .build_plotting_rows(interval, tail_padding)?
                .into_iter()
                .map(PlottingRow::into_row)
                .collect()),
        }
    }
}

/// Counts gathered while assembling a dataset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssemblyReport {
    /// Distinct entities among the accepted events
    pub entities: usize,
    /// Entities dropped by the event-count outlier filter
    pub outliers_removed: usize,
    /// Retained entities that could not produce a single row
    pub insufficient_data: usize,
    pub rows: usize,
}

/// Concatenated rows of every retained entity
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Dataset {
    pub rows: Vec<Row>,
    pub report: AssemblyReport,
}

impl Dataset {
    /// Union of the column names of every row
    pub fn columns(&self) -> BTreeSet<&'static str> {
        self.rows
            .iter()
            .flat_map(|row| row.keys().copied())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
