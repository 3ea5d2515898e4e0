//! Interaction log record definition
//!
//! A raw record is one interaction of a user with a vocabulary item:
//! - Reading events (word highlights, sentence clicks, sentences read)
//! - Revision outcomes (clicked for the definition or recalled without it)
//! - Extension kinds for book drills and video subtitles

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Interaction message kinds accepted on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Message {
    #[serde(rename = "TEXT__WORD_HIGHLIGHTED")]
    TextWordHighlighted,
    #[serde(rename = "TEXT__SENTENCE_CLICK")]
    TextSentenceClick,
    #[serde(rename = "TEXT__SENTENCE_READ")]
    TextSentenceRead,
    #[serde(rename = "REVISION__CLICKED")]
    RevisionClicked,
    #[serde(rename = "REVISION__NOT_CLICKED")]
    RevisionNotClicked,
    #[serde(rename = "BOOK_DRILL__CLICKED")]
    BookDrillClicked,
    #[serde(rename = "BOOK_DRILL__NOT_CLICKED")]
    BookDrillNotClicked,
    #[serde(rename = "VIDEO__WORD_HIGHLIGHTED")]
    VideoWordHighlighted,
    #[serde(rename = "VIDEO__SENTENCE_WATCHED")]
    VideoSentenceWatched,
}

impl Message {
    pub const ALL: [Message; 9] = [
        Message::TextWordHighlighted,
        Message::TextSentenceClick,
        Message::TextSentenceRead,
        Message::RevisionClicked,
        Message::RevisionNotClicked,
        Message::BookDrillClicked,
        Message::BookDrillNotClicked,
        Message::VideoWordHighlighted,
        Message::VideoSentenceWatched,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Message::TextWordHighlighted => "TEXT__WORD_HIGHLIGHTED",
            Message::TextSentenceClick => "TEXT__SENTENCE_CLICK",
            Message::TextSentenceRead => "TEXT__SENTENCE_READ",
            Message::RevisionClicked => "REVISION__CLICKED",
            Message::RevisionNotClicked => "REVISION__NOT_CLICKED",
            Message::BookDrillClicked => "BOOK_DRILL__CLICKED",
            Message::BookDrillNotClicked => "BOOK_DRILL__NOT_CLICKED",
            Message::VideoWordHighlighted => "VIDEO__WORD_HIGHLIGHTED",
            Message::VideoSentenceWatched => "VIDEO__SENTENCE_WATCHED",
        }
    }

    /// The learner had to look the word up (counts against recall)
    pub fn is_click(&self) -> bool {
        matches!(
            self,
            Message::TextWordHighlighted
                | Message::RevisionClicked
                | Message::BookDrillClicked
                | Message::VideoWordHighlighted
        )
    }

    /// The learner met the word without looking it up
    pub fn is_recall(&self) -> bool {
        matches!(
            self,
            Message::TextSentenceRead
                | Message::RevisionNotClicked
                | Message::BookDrillNotClicked
                | Message::VideoSentenceWatched
        )
    }

    /// Continues the current streak without opening a new one
    pub fn is_continuation(&self) -> bool {
        matches!(self, Message::TextSentenceClick)
    }

    pub fn is_revision(&self) -> bool {
        matches!(self, Message::RevisionClicked | Message::RevisionNotClicked)
    }

    pub fn is_book_drill(&self) -> bool {
        matches!(self, Message::BookDrillClicked | Message::BookDrillNotClicked)
    }

    /// Outcome carried by the message, `Some(true)` meaning the word was clicked.
    ///
    /// Only explicit exercises (revisions, book drills) carry an outcome unless
    /// text interactions are counted as clicks.
    pub fn outcome(&self, counting: ClickCounting) -> Option<bool> {
        match (self, counting) {
            (Message::RevisionClicked | Message::BookDrillClicked, _) => Some(true),
            (Message::RevisionNotClicked | Message::BookDrillNotClicked, _) => Some(false),
            (
                Message::TextWordHighlighted | Message::VideoWordHighlighted,
                ClickCounting::TextAsClicks,
            ) => Some(true),
            (
                Message::TextSentenceRead | Message::VideoSentenceWatched,
                ClickCounting::TextAsClicks,
            ) => Some(false),
            _ => None,
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Message {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Message::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownMessage(s.to_string()))
    }
}

/// Whether reading interactions count as click outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickCounting {
    /// Only revisions and book drills carry an outcome
    #[default]
    ExercisesOnly,
    /// Highlights count as clicks and reads as non-clicks
    TextAsClicks,
}

/// Raw record as it arrives from the interaction log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub user: String,
    #[serde(alias = "lemma")]
    pub item: String,
    /// Seconds since an arbitrary epoch
    pub timestamp: i64,
    pub message: String,
}

/// Identity of an event-producing entity: a user paired with an item
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId {
    pub user: String,
    pub item: String,
}

impl EntityId {
    pub fn new(user: impl Into<String>, item: impl Into<String>) -> Self {
        EntityId {
            user: user.into(),
            item: item.into(),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.user, self.item)
    }
}

/// Timestamped message without its identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    pub timestamp: i64,
    pub message: Message,
}

impl Interaction {
    pub fn new(timestamp: i64, message: Message) -> Self {
        Interaction { timestamp, message }
    }
}

/// A validated interaction event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub entity: EntityId,
    pub interaction: Interaction,
}

impl Event {
    pub fn new(entity: EntityId, timestamp: i64, message: Message) -> Self {
        Event {
            entity,
            interaction: Interaction::new(timestamp, message),
        }
    }

    /// Validate an untyped JSON record
    pub fn from_value(value: &serde_json::Value) -> Result<Self, ValidationError> {
        let record = RawRecord::deserialize(value)
            .map_err(|e| ValidationError::Malformed(e.to_string()))?;
        Event::try_from(record)
    }

    pub fn timestamp(&self) -> i64 {
        self.interaction.timestamp
    }

    pub fn message(&self) -> Message {
        self.interaction.message
    }
}

impl TryFrom<RawRecord> for Event {
    type Error = ValidationError;

    fn try_from(record: RawRecord) -> Result<Self, Self::Error> {
        let message = record.message.parse::<Message>()?;
        Ok(Event::new(
            EntityId::new(record.user, record.item),
            check_timestamp(record.timestamp)?,
            message,
        ))
    }
}

/// Largest accepted timestamp magnitude. Differences of two accepted
/// timestamps plus any bucket or padding offset stay within `i64`.
pub const MAX_TIMESTAMP: i64 = i64::MAX / 4;

/// Reject timestamps outside `-MAX_TIMESTAMP..=MAX_TIMESTAMP`
pub fn check_timestamp(timestamp: i64) -> Result<i64, ValidationError> {
    if (-MAX_TIMESTAMP..=MAX_TIMESTAMP).contains(&timestamp) {
        Ok(timestamp)
    } else {
        Err(ValidationError::TimestampOutOfRange(timestamp))
    }
}

/// Validation errors for raw records
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Malformed record: {0}")]
    Malformed(String),

    #[error("{0} is not a valid log message")]
    UnknownMessage(String),

    #[error("Timestamp {0} is out of range")]
    TimestampOutOfRange(i64),
}
