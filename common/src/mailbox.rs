use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::MessageId;

/// One delivered message reference in a receiver's mailbox.
///
/// Mailboxes are append-only sequences of these, oldest first. `read`
/// flips false→true, one-way; marking an already-read entry is a no-op.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MailboxEntry {
    pub message_id: MessageId,
    pub received_at: DateTime<Utc>,
    pub read: bool,
}
