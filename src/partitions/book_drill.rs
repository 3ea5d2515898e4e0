//! Book drills: vocabulary exercises attached to a book the learner reads

use crate::partitions::Partition;
use crate::schema::{Interaction, Message};
use crate::types::{Elapsed, Row};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookDrillFeatures {
    pub clicked_amount: u32,
    pub not_clicked_amount: u32,
    pub all_amount: u32,
    pub clicked_seconds: Elapsed,
    pub not_clicked_seconds: Elapsed,
    pub all_seconds: Elapsed,
}

#[derive(Debug, Clone, Default)]
struct BookDrillState {
    clicked_at: Option<i64>,
    not_clicked_at: Option<i64>,
    previous_message: Option<Message>,
}

#[derive(Debug, Clone, Default)]
pub struct BookDrillPartition {
    features: BookDrillFeatures,
    state: BookDrillState,
}

impl BookDrillPartition {
    pub fn features(&self) -> &BookDrillFeatures {
        &self.features
    }
}

impl Partition for BookDrillPartition {
    fn update(&mut self, interaction: &Interaction) {
        let Interaction { timestamp, message } = *interaction;

        self.update_timestamp(timestamp);

        if !message.is_book_drill() {
            return;
        }

        match message {
            Message::BookDrillClicked => self.state.clicked_at = Some(timestamp),
            _ => self.state.not_clicked_at = Some(timestamp),
        }

        // Credit the previous drill so a row never sees its own outcome
        match self.state.previous_message {
            Some(Message::BookDrillClicked) => self.features.clicked_amount += 1,
            Some(Message::BookDrillNotClicked) => self.features.not_clicked_amount += 1,
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
        row.insert("BOOK_DRILL__CLICKED_amount", f.clicked_amount.into());
        row.insert("BOOK_DRILL__NOT_CLICKED_amount", f.not_clicked_amount.into());
        row.insert("BOOK_DRILL__ALL_amount", f.all_amount.into());
        row.insert("BOOK_DRILL__CLICKED_seconds", f.clicked_seconds.into());
        row.insert("BOOK_DRILL__NOT_CLICKED_seconds", f.not_clicked_seconds.into());
        row.insert("BOOK_DRILL__ALL_seconds", f.all_seconds.into());
    }
}
