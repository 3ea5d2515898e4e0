//! Reading interactions: highlights, sentence clicks and sentences read
//!
//! Amounts are credited to the previous message when the next one arrives,
//! so a row never counts the interaction it is anchored on.

use crate::partitions::Partition;
use crate::schema::{Interaction, Message};
use crate::types::{Elapsed, Row};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadingFeatures {
    pub word_highlighted_amount: u32,
    pub sentence_click_amount: u32,
    pub sentence_read_amount: u32,
    /// Sentences clicked or read; a highlight implies a sentence click
    pub all_amount: u32,
    pub word_highlighted_seconds: Elapsed,
    pub sentence_click_seconds: Elapsed,
    pub sentence_read_seconds: Elapsed,
    pub all_seconds: Elapsed,
}

#[derive(Debug, Clone, Default)]
struct ReadingState {
    seen_first: bool,
    word_highlighted_at: Option<i64>,
    sentence_click_at: Option<i64>,
    sentence_read_at: Option<i64>,
    previous_message: Option<Message>,
}

#[derive(Debug, Clone, Default)]
pub struct ReadingPartition {
    features: ReadingFeatures,
    state: ReadingState,
}

impl ReadingPartition {
    pub fn features(&self) -> &ReadingFeatures {
        &self.features
    }
}

impl Partition for ReadingPartition {
    fn update(&mut self, interaction: &Interaction) {
        let Interaction { timestamp, message } = *interaction;

        // The first exposure counts as a sentence click and a highlight
        if !self.state.seen_first {
            self.state.seen_first = true;
            self.state.sentence_click_at = Some(timestamp);
            self.features.sentence_click_amount += 1;
            self.state.word_highlighted_at = Some(timestamp);
            self.features.word_highlighted_amount += 1;
        }

        self.update_timestamp(timestamp);

        match self.state.previous_message {
            Some(Message::TextSentenceRead) => self.features.sentence_read_amount += 1,
            Some(Message::TextSentenceClick) => self.features.sentence_click_amount += 1,
            Some(Message::TextWordHighlighted) => self.features.word_highlighted_amount += 1,
            _ => {}
        }
        self.state.previous_message = Some(message);

        match message {
            Message::TextSentenceRead => self.state.sentence_read_at = Some(timestamp),
            Message::TextSentenceClick => self.state.sentence_click_at = Some(timestamp),
            Message::TextWordHighlighted => self.state.word_highlighted_at = Some(timestamp),
            _ => {}
        }

        self.features.all_amount =
            self.features.sentence_read_amount + self.features.sentence_click_amount;
    }

    fn update_timestamp(&mut self, timestamp: i64) {
        let f = &mut self.features;
        f.sentence_read_seconds = Elapsed::since(timestamp, self.state.sentence_read_at);
        f.sentence_click_seconds = Elapsed::since(timestamp, self.state.sentence_click_at);
        f.word_highlighted_seconds = Elapsed::since(timestamp, self.state.word_highlighted_at);
        f.all_seconds = f
            .sentence_read_seconds
            .min(f.sentence_click_seconds)
            .min(f.word_highlighted_seconds);
    }

    fn project(&self, row: &mut Row) {
        let f = &self.features;
        row.insert("TEXT__WORD_HIGHLIGHTED_amount", f.word_highlighted_amount.into());
        row.insert("TEXT__SENTENCE_CLICK_amount", f.sentence_click_amount.into());
        row.insert("TEXT__SENTENCE_READ_amount", f.sentence_read_amount.into());
        row.insert("TEXT__ALL_amount", f.all_amount.into());
        row.insert("TEXT__WORD_HIGHLIGHTED_seconds", f.word_highlighted_seconds.into());
        row.insert("TEXT__SENTENCE_CLICK_seconds", f.sentence_click_seconds.into());
        row.insert("TEXT__SENTENCE_READ_seconds", f.sentence_read_seconds.into());
        row.insert("TEXT__ALL_seconds", f.all_seconds.into());
    }
}
