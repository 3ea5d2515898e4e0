//! Aggregate feature snapshot
//!
//! Owns one instance of every partition and feeds each interaction to all of
//! them in a fixed order: common, reading, revision, book drill, all.

use crate::partitions::{
    AllPartition, BookDrillPartition, CommonPartition, Partition, ReadingPartition,
    RevisionPartition,
};
use crate::schema::{ClickCounting, Interaction};
use crate::types::{Elapsed, Projection, Row};

/// Running features of one entity
#[derive(Debug, Clone, Default)]
pub struct FeatureSnapshot {
    common: CommonPartition,
    reading: ReadingPartition,
    revision: RevisionPartition,
    book_drill: BookDrillPartition,
    all: AllPartition,
}

impl FeatureSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one interaction; only exercises set the click flag
    pub fn update(&mut self, interaction: &Interaction) {
        self.common.update(interaction);
        self.update_partitions(interaction);
    }

    /// Fold one interaction, letting highlights and reads set the click flag too
    pub fn update_counting_text_as_clicks(&mut self, interaction: &Interaction) {
        self.common.update_counting_text_as_clicks(interaction);
        self.update_partitions(interaction);
    }

    pub fn update_with(&mut self, interaction: &Interaction, counting: ClickCounting) {
        match counting {
            ClickCounting::ExercisesOnly => self.update(interaction),
            ClickCounting::TextAsClicks => self.update_counting_text_as_clicks(interaction),
        }
    }

    fn update_partitions(&mut self, interaction: &Interaction) {
        self.reading.update(interaction);
        self.revision.update(interaction);
        self.book_drill.update(interaction);
        self.all.update(interaction);
    }

    /// Recompute every seconds-since feature at `timestamp`
    pub fn update_timestamp(&mut self, timestamp: i64) {
        self.common.update_timestamp(timestamp);
        self.reading.update_timestamp(timestamp);
        self.revision.update_timestamp(timestamp);
        self.book_drill.update_timestamp(timestamp);
        self.all.update_timestamp(timestamp);
    }

    /// Flat view of the public features selected by `projection`
    pub fn project(&self, projection: Projection) -> Row {
        let mut row = Row::new();
        self.common.project(&mut row);
        if projection.includes_reading() {
            self.reading.project(&mut row);
        }
        if projection.includes_revision() {
            self.revision.project(&mut row);
        }
        if projection.includes_aggregates() {
            self.book_drill.project(&mut row);
            self.all.project(&mut row);
        }
        row
    }

    /// Seconds since the first interaction, `Never` before any
    pub fn first_exposure_seconds(&self) -> Elapsed {
        self.common.features().first_exposure_seconds
    }

    pub fn common(&self) -> &CommonPartition {
        &self.common
    }

    pub fn reading(&self) -> &ReadingPartition {
        &self.reading
    }

    pub fn revision(&self) -> &RevisionPartition {
        &self.revision
    }

    pub fn book_drill(&self) -> &BookDrillPartition {
        &self.book_drill
    }

    pub fn all(&self) -> &AllPartition {
        &self.all
    }
}
