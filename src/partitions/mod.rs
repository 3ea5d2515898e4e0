//! Per-entity feature partitions
//!
//! Each partition folds one interaction at a time into a public feature
//! record and keeps its own bookkeeping out of that record. The snapshot in
//! [`crate::snapshot`] drives them in a fixed order.

mod all;
mod book_drill;
mod common;
mod reading;
mod revision;

pub use all::{AllFeatures, AllPartition};
pub use book_drill::{BookDrillFeatures, BookDrillPartition};
pub use common::{CommonFeatures, CommonPartition};
pub use reading::{ReadingFeatures, ReadingPartition};
pub use revision::{RevisionFeatures, RevisionPartition};

use crate::schema::Interaction;
use crate::types::Row;

/// Incremental reducer over one entity's interactions
pub trait Partition {
    /// Fold one interaction into the partition
    fn update(&mut self, interaction: &Interaction);

    /// Recompute every seconds-since feature at `timestamp` without an interaction
    fn update_timestamp(&mut self, timestamp: i64);

    /// Write the public features into `row`
    fn project(&self, row: &mut Row);
}
