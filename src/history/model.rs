//! Message history data model.
//!
//! The server decides what a recorded message looks like. The console only
//! relies on the user/bot pairing of an exchange, so each message is kept as
//! the JSON the server sent and its well-known fields are read on demand.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Which side of the conversation authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Authored by the user.
    Incoming,
    /// Authored by the bot.
    Outgoing,
}

impl Direction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Incoming => "incoming",
            Self::Outgoing => "outgoing",
        }
    }
}

/// A single recorded message event, exactly as the server sent it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Message(Value);

impl Message {
    /// Wrap a raw message record.
    #[must_use]
    pub fn new(raw: Value) -> Self {
        Self(raw)
    }

    /// Create a text message.
    #[must_use]
    pub fn text(
        id: impl Into<String>,
        direction: Direction,
        text: impl Into<String>,
        sent_on: DateTime<Utc>,
    ) -> Self {
        Self(json!({
            "id": id.into(),
            "direction": direction.as_str(),
            "type": "text",
            "payload": { "type": "text", "text": text.into() },
            "sentOn": sent_on.to_rfc3339(),
        }))
    }

    /// Event identifier, if the record carries a string `id`.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(Value::as_str)
    }

    /// Author side, if the record carries a known `direction`.
    #[must_use]
    pub fn direction(&self) -> Option<Direction> {
        match self.0.get("direction").and_then(Value::as_str)? {
            "incoming" => Some(Direction::Incoming),
            "outgoing" => Some(Direction::Outgoing),
            _ => None,
        }
    }

    /// Content type (`text`, `image`, `carousel`, ...).
    #[must_use]
    pub fn kind(&self) -> Option<&str> {
        self.0.get("type").and_then(Value::as_str)
    }

    /// Channel payload.
    #[must_use]
    pub fn payload(&self) -> Option<&Value> {
        self.0.get("payload")
    }

    /// When the message was recorded (`sentOn`, else `createdOn`).
    #[must_use]
    pub fn sent_on(&self) -> Option<DateTime<Utc>> {
        ["sentOn", "createdOn"]
            .iter()
            .filter_map(|key| self.0.get(*key).and_then(Value::as_str))
            .find_map(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|at| at.with_timezone(&Utc))
    }

    /// The raw record.
    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

/// One conversational turn: a user message and the bot's replies to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageExchange {
    /// The message that opened the turn.
    pub user_message: Message,
    /// Bot replies, in the order they were sent.
    #[serde(default)]
    pub bot_messages: Vec<Message>,
}

impl MessageExchange {
    /// Number of messages in this turn, the user message included.
    #[must_use]
    pub fn message_count(&self) -> usize {
        1 + self.bot_messages.len()
    }
}
