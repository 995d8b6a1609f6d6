use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a message. Strictly increasing from 1.
pub type MessageId = u64;

/// A stored anonymous message.
///
/// Content is immutable after creation. `flagged` transitions
/// false→true at most once, through the flag register.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub content: String,
    /// Value of the token that was consumed to send this message.
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub flagged: bool,
    /// Receivers that have read this message. Superseded by the
    /// per-mailbox read state; kept so older table snapshots still load.
    #[serde(default)]
    pub read_by: Vec<String>,
}

/// A mailbox entry joined with its message, as handed to receivers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageView {
    pub message_id: MessageId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
    pub read: bool,
    pub flagged: bool,
}
