//! Revision exercises: the learner either clicked for the definition or not

use crate::partitions::Partition;
use crate::schema::{Interaction, Message};
use crate::types::{Elapsed, Row};

#[derive(Debug, Clone, PartialEq)]
pub struct RevisionFeatures {
    pub clicked_amount: u32,
    pub not_clicked_amount: u32,
    pub all_amount: u32,
    pub clicked_seconds: Elapsed,
    pub not_clicked_seconds: Elapsed,
    pub all_seconds: Elapsed,
    /// `last_interval / previous_interval`, 1 when there is no previous interval
    pub interval_ratio: f64,
    /// Seconds between the latest revision and the one before it (or first exposure)
    pub last_interval: Elapsed,
    pub previous_interval: Elapsed,
}

impl Default for RevisionFeatures {
    fn default() -> Self {
        Self {
            clicked_amount: 0,
            not_clicked_amount: 0,
            all_amount: 0,
            clicked_seconds: Elapsed::Never,
            not_clicked_seconds: Elapsed::Never,
            all_seconds: Elapsed::Never,
            interval_ratio: 1.0,
            last_interval: Elapsed::Never,
            previous_interval: Elapsed::Seconds(0),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct RevisionState {
    clicked_at: Option<i64>,
    not_clicked_at: Option<i64>,
    any_at: Option<i64>,
    previous_message: Option<Message>,
}

#[derive(Debug, Clone, Default)]
pub struct RevisionPartition {
    features: RevisionFeatures,
    state: RevisionState,
}

impl RevisionPartition {
    pub fn features(&self) -> &RevisionFeatures {
        &self.features
    }

    fn update_intervals(&mut self, timestamp: i64) {
        let f = &mut self.features;
        f.previous_interval = f.last_interval;
        f.last_interval = Elapsed::since(timestamp, self.state.any_at);

        f.interval_ratio = match (f.last_interval, f.previous_interval) {
            (Elapsed::Seconds(last), Elapsed::Seconds(previous)) if previous != 0 => {
                last as f64 / previous as f64
            }
            _ => 1.0,
        };
    }

    fn store_timestamps(&mut self, message: Message, timestamp: i64) {
        match message {
            Message::RevisionClicked => self.state.clicked_at = Some(timestamp),
            Message::RevisionNotClicked => self.state.not_clicked_at = Some(timestamp),
            _ => {}
        }
        self.state.any_at = Some(timestamp);
    }
}

impl Partition for RevisionPartition {
    fn update(&mut self, interaction: &Interaction) {
        let Interaction { timestamp, message } = *interaction;

        // The first exposure acts as a clicked revision baseline
        if self.state.any_at.is_none() {
            self.state.clicked_at = Some(timestamp);
            self.state.any_at = Some(timestamp);
        }

        self.update_timestamp(timestamp);

        if !message.is_revision() {
            return;
        }

        self.update_intervals(timestamp);
        self.store_timestamps(message, timestamp);

        match self.state.previous_message {
            Some(Message::RevisionClicked) => self.features.clicked_amount += 1,
            Some(Message::RevisionNotClicked) => self.features.not_clicked_amount += 1,
            _ => {}
        }

        self.features.all_amount = self.features.clicked_amount + self.features.not_clicked_amount;
        self.state.previous_message = Some(message);
    }

    fn update_timestamp(&mut self, timestamp: i64) {
        let f = &mut self.features;
        f.clicked_seconds = Elapsed::since(timestamp, self.state.clicked_at);
        f.not_clicked_seconds = Elapsed::since(timestamp, self.state.not_clicked_at);
        f.all_seconds = f.clicked_seconds.min(f.not_clicked_seconds);
    }

    fn project(&self, row: &mut Row) {
        let f = &self.features;
        row.insert("REVISION__CLICKED_amount", f.clicked_amount.into());
        row.insert("REVISION__NOT_CLICKED_amount", f.not_clicked_amount.into());
        row.insert("REVISION__ALL_amount", f.all_amount.into());
        row.insert("REVISION__CLICKED_seconds", f.clicked_seconds.into());
        row.insert("REVISION__NOT_CLICKED_seconds", f.not_clicked_seconds.into());
        row.insert("REVISION__ALL_seconds", f.all_seconds.into());
        row.insert("REVISION_interval_ratio", f.interval_ratio.into());
        row.insert("REVISION_last_interval", f.last_interval.into());
        row.insert("REVISION_previous_interval", f.previous_interval.into());
    }
}
