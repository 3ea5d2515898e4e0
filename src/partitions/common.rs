use crate::partitions::Partition;
use crate::schema::{ClickCounting, Interaction};
use crate::types::{Elapsed, Row};

/// Features shared by every projection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommonFeatures {
    /// Outcome of the latest exercise
    pub clicked: bool,
    /// Seconds since the entity's first interaction
    pub first_exposure_seconds: Elapsed,
}

impl Default for CommonFeatures {
    fn default() -> Self {
        Self {
            clicked: true,
            first_exposure_seconds: Elapsed::Never,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct CommonState {
    first_exposure: Option<i64>,
}

/// Click flag and first-exposure clock
#[derive(Debug, Clone, Default)]
pub struct CommonPartition {
    features: CommonFeatures,
    state: CommonState,
}

impl CommonPartition {
    pub fn features(&self) -> &CommonFeatures {
        &self.features
    }

    /// Fold an interaction, letting highlights and reads set the click flag too
    pub fn update_counting_text_as_clicks(&mut self, interaction: &Interaction) {
        self.update_with(interaction, ClickCounting::TextAsClicks);
    }

    fn update_with(&mut self, interaction: &Interaction, counting: ClickCounting) {
        if self.state.first_exposure.is_none() {
            self.state.first_exposure = Some(interaction.timestamp);
        }

        self.update_timestamp(interaction.timestamp);

        if let Some(clicked) = interaction.message.outcome(counting) {
            self.features.clicked = clicked;
        }
    }
}

impl Partition for CommonPartition {
    fn update(&mut self, interaction: &Interaction) {
        self.update_with(interaction, ClickCounting::ExercisesOnly);
    }

    fn update_timestamp(&mut self, timestamp: i64) {
        self.features.first_exposure_seconds = Elapsed::since(timestamp, self.state.first_exposure);
    }

    fn project(&self, row: &mut Row) {
        row.insert("CLICKED", self.features.clicked.into());
        row.insert("FIRST_EXPOSURE_seconds", self.features.first_exposure_seconds.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Message;

    #[test]
    fn test_first_exposure_clock() {
        let mut common = CommonPartition::default();
        assert_eq!(common.features().first_exposure_seconds, Elapsed::Never);

        common.update(&Interaction::new(100, Message::TextWordHighlighted));
        common.update(&Interaction::new(2000, Message::RevisionClicked));
        assert_eq!(common.features().first_exposure_seconds, Elapsed::Seconds(1900));

        common.update_timestamp(5000);
        assert_eq!(common.features().first_exposure_seconds, Elapsed::Seconds(4900));
    }

    #[test]
    fn test_text_interactions_only_count_when_requested() {
        let mut common = CommonPartition::default();
        common.update(&Interaction::new(0, Message::RevisionClicked));
        common.update(&Interaction::new(10, Message::TextSentenceRead));
        assert!(common.features().clicked);

        common.update_counting_text_as_clicks(&Interaction::new(20, Message::TextSentenceRead));
        assert!(!common.features().clicked);

        common.update(&Interaction::new(30, Message::BookDrillClicked));
        assert!(common.features().clicked);
    }
}
