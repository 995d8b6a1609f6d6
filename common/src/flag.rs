use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::MessageId;

/// Unique identifier for a moderation flag. Strictly increasing from 1.
pub type FlagId = u64;

/// A moderator-created record marking a message for review.
/// At most one exists per message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flag {
    pub id: FlagId,
    pub message_id: MessageId,
    pub moderator: String,
    pub created_at: DateTime<Utc>,
}
