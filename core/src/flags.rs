//! Moderation flags, at most one per message.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use whisper_common::flag::{Flag, FlagId};
use whisper_common::message::MessageId;

use crate::error::{Error, Result};
use crate::messaging::MessageTable;
use crate::store::Table;

/// Contents of the flag table.
#[derive(Debug, Serialize, Deserialize)]
pub struct FlagTable {
    pub flags: BTreeMap<FlagId, Flag>,
    pub next_id: FlagId,
}

impl Default for FlagTable {
    fn default() -> Self {
        Self {
            flags: BTreeMap::new(),
            next_id: 1,
        }
    }
}

/// Records moderation flags against messages, enforcing flag-once.
pub struct FlagRegister {
    messages: Arc<Table<MessageTable>>,
    flags: Arc<Table<FlagTable>>,
}

impl FlagRegister {
    pub fn new(messages: Arc<Table<MessageTable>>, flags: Arc<Table<FlagTable>>) -> Self {
        Self { messages, flags }
    }

    /// Record a flag against `message_id`.
    ///
    /// The existence check, the flag insert and the `flagged` bit all
    /// happen under the message table lock, so two racing moderators
    /// cannot both win: the loser sees `AlreadyFlagged`. Lock order is
    /// messages → flags.
    pub fn flag(&self, moderator: &str, message_id: MessageId) -> Result<FlagId> {
        self.messages.with_lock(|messages| {
            let message = messages
                .messages
                .get_mut(&message_id)
                .ok_or(Error::UnknownMessage(message_id))?;
            if message.flagged {
                return Err(Error::AlreadyFlagged(message_id));
            }
            let flag_id = self.flags.with_lock(|flags| {
                let id = flags.next_id;
                flags.next_id += 1;
                flags.flags.insert(
                    id,
                    Flag {
                        id,
                        message_id,
                        moderator: moderator.to_string(),
                        created_at: Utc::now(),
                    },
                );
                Ok(id)
            })?;
            message.flagged = true;
            Ok(flag_id)
        })
    }
}
