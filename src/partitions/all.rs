//! Aggregates across every interaction kind, including leading streaks
//!
//! A streak is advanced for the previous interaction when the next timestamp
//! arrives, so the features at an interaction describe the history before it.

use crate::partitions::Partition;
use crate::schema::{Interaction, Message};
use crate::types::{Elapsed, Row};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllFeatures {
    pub amount: u32,
    /// Seconds since the previous interaction of any kind
    pub seconds: Elapsed,
    /// Consecutive lookups ending at the latest interaction
    pub leading_failures_amount: u32,
    pub leading_failures_seconds: i64,
    /// Consecutive recalls ending at the latest interaction
    pub leading_recalls_amount: u32,
    pub leading_recalls_seconds: i64,
    pub longest_leading_recalls_seconds: i64,
}

#[derive(Debug, Clone, Default)]
struct AllState {
    last_timestamp: Option<i64>,
    /// Interaction whose streak contribution is still pending
    pending: Option<Message>,
    recall_streak_start: Option<i64>,
    failure_streak_start: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct AllPartition {
    features: AllFeatures,
    state: AllState,
}

impl AllPartition {
    pub fn features(&self) -> &AllFeatures {
        &self.features
    }

    fn update_streak(&mut self) {
        let (Some(message), Some(last)) = (self.state.pending, self.state.last_timestamp) else {
            return;
        };

        if message.is_click() {
            if self.state.failure_streak_start.is_none() {
                self.state.failure_streak_start = Some(last);
            }
            self.extend_failure_streak(last);
        } else if message.is_recall() {
            if self.state.recall_streak_start.is_none() {
                self.state.recall_streak_start = Some(last);
            }
            self.extend_recall_streak(last);
        } else if message.is_continuation() {
            if self.state.recall_streak_start.is_some() {
                self.extend_recall_streak(last);
            } else if self.state.failure_streak_start.is_some() {
                self.extend_failure_streak(last);
            }
        }
    }

    fn extend_failure_streak(&mut self, last: i64) {
        let start = self.state.failure_streak_start.unwrap_or(last);
        let f = &mut self.features;
        f.leading_failures_amount += 1;
        f.leading_failures_seconds = last - start;
        f.leading_recalls_amount = 0;
        f.leading_recalls_seconds = 0;
        self.state.recall_streak_start = None;
    }

    fn extend_recall_streak(&mut self, last: i64) {
        let start = self.state.recall_streak_start.unwrap_or(last);
        let f = &mut self.features;
        f.leading_recalls_amount += 1;
        f.leading_recalls_seconds = last - start;
        f.longest_leading_recalls_seconds = f
            .longest_leading_recalls_seconds
            .max(f.leading_recalls_seconds);
        f.leading_failures_amount = 0;
        f.leading_failures_seconds = 0;
        self.state.failure_streak_start = None;
    }
}

impl Partition for AllPartition {
    fn update(&mut self, interaction: &Interaction) {
        self.update_timestamp(interaction.timestamp);
        self.features.amount += 1;
        self.state.last_timestamp = Some(interaction.timestamp);
        self.state.pending = Some(interaction.message);
    }

    fn update_timestamp(&mut self, timestamp: i64) {
        self.features.seconds = Elapsed::since(timestamp, self.state.last_timestamp);
        self.update_streak();
        self.state.pending = None;
    }

    fn project(&self, row: &mut Row) {
        let f = &self.features;
        row.insert("ALL_amount", f.amount.into());
        row.insert("ALL_seconds", f.seconds.into());
        row.insert("ALL_leading_failures_amount", f.leading_failures_amount.into());
        row.insert("ALL_leading_failures_seconds", f.leading_failures_seconds.into());
        row.insert("ALL_leading_recalls_amount", f.leading_recalls_amount.into());
        row.insert("ALL_leading_recalls_seconds", f.leading_recalls_seconds.into());
        row.insert(
            "ALL_longest_leading_recalls_seconds",
            f.longest_leading_recalls_seconds.into(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fold(events: &[(i64, Message)]) -> AllPartition {
        let mut all = AllPartition::default();
        for (t, m) in events {
            all.update(&Interaction::new(*t, *m));
        }
        all
    }

    #[test]
    fn test_streak_lags_one_interaction() {
        let all = fold(&[(0, Message::TextSentenceRead)]);
        assert_eq!(all.features().leading_recalls_amount, 0);
        assert_eq!(all.features().amount, 1);
        assert_eq!(all.features().seconds, Elapsed::Never);
    }

    #[test]
    fn test_recall_streak_and_reset() {
        let mut all = fold(&[
            (0, Message::TextSentenceRead),
            (100, Message::RevisionNotClicked),
            (300, Message::TextSentenceClick),
            (400, Message::RevisionClicked),
        ]);
        let f = all.features();
        // read, not-clicked and the continuing sentence click form one streak
        assert_eq!(f.leading_recalls_amount, 3);
        assert_eq!(f.leading_recalls_seconds, 300);
        assert_eq!(f.longest_leading_recalls_seconds, 300);
        assert_eq!(f.seconds, Elapsed::Seconds(100));

        all.update_timestamp(1000);
        let f = all.features();
        assert_eq!(f.leading_recalls_amount, 0);
        assert_eq!(f.leading_recalls_seconds, 0);
        assert_eq!(f.leading_failures_amount, 1);
        assert_eq!(f.leading_failures_seconds, 0);
        assert_eq!(f.longest_leading_recalls_seconds, 300);
        assert_eq!(f.seconds, Elapsed::Seconds(600));
    }

    #[test]
    fn test_update_timestamp_applies_pending_streak_once() {
        let mut all = fold(&[
            (0, Message::TextWordHighlighted),
            (50, Message::RevisionClicked),
        ]);
        all.update_timestamp(60);
        all.update_timestamp(70);
        let f = all.features();
        assert_eq!(f.leading_failures_amount, 2);
        assert_eq!(f.leading_failures_seconds, 50);
    }

    #[test]
    fn test_continuation_without_open_streak_is_ignored() {
        let mut all = fold(&[(0, Message::TextSentenceClick)]);
        all.update_timestamp(10);
        let f = all.features();
        assert_eq!(f.leading_failures_amount, 0);
        assert_eq!(f.leading_recalls_amount, 0);
    }
}
