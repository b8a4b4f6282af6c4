//! Canonical message types shared between Slack and the trivia engine.
//!
//! This module defines the single source of truth for the shapes that
//! cross the boundary between the chat platform and the game engine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of conversation a message was posted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelKind {
    /// The shared trivia channel.
    #[serde(rename = "channel")]
    Channel,
    /// A one-to-one conversation with the bot.
    #[serde(rename = "im")]
    DirectMessage,
}

impl ChannelKind {
    /// Map a Slack `channel_type` value to a channel kind.
    pub fn from_slack(channel_type: Option<&str>) -> Self {
        match channel_type {
            Some("im") => Self::DirectMessage,
            _ => Self::Channel,
        }
    }
}

/// A chat message that passed every inbound filter.
///
/// Only the message filter builds these. Fields are read-only; the value is
/// also the opaque payload handed to the engine and echoed back in events.
/// Echoed copies are deserialized from engine output and are only acted on
/// when they match a message the engine link actually forwarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalMessage {
    user_id: String,
    text: String,
    timestamp: String,
    channel_id: String,
    channel_kind: ChannelKind,
}

impl CanonicalMessage {
    pub(crate) fn new(
        user_id: impl Into<String>,
        text: impl Into<String>,
        timestamp: impl Into<String>,
        channel_id: impl Into<String>,
        channel_kind: ChannelKind,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            text: text.into(),
            timestamp: timestamp.into(),
            channel_id: channel_id.into(),
            channel_kind,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Slack `ts` of the message, used to react or reply to it.
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    pub fn channel_kind(&self) -> ChannelKind {
        self.channel_kind
    }
}

/// The player who answered a question first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinningUser {
    #[serde(rename = "uid", alias = "user_id")]
    pub user_id: String,
    /// Points scored today.
    pub score: i64,
    /// Position on today's scoreboard.
    pub rank: u32,
}

/// A value the engine sends only to be shown: a number or free text
/// such as `"$200"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DisplayValue {
    Number(serde_json::Number),
    Text(String),
}

impl fmt::Display for DisplayValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for DisplayValue {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<&str> for DisplayValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// A finished question as reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRecord {
    #[serde(default)]
    pub winning_user: Option<WinningUser>,
    pub winning_answer: String,
    pub year: DisplayValue,
    pub category: DisplayValue,
    pub value: DisplayValue,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(rename = "question")]
    pub question_text: String,
}
