//! Message store, mailbox router and the orchestrating service.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;
use whisper_common::flag::FlagId;
use whisper_common::mailbox::MailboxEntry;
use whisper_common::message::{Message, MessageId, MessageView};
use whisper_common::token::Token;

use crate::audit::AuditSink;
use crate::error::{Error, Result};
use crate::flags::FlagRegister;
use crate::store::{Stores, Table};
use crate::tokens::{TokenIssuer, TokenTable};

/// Contents of the message table.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageTable {
    pub messages: BTreeMap<MessageId, Message>,
    pub next_id: MessageId,
}

impl Default for MessageTable {
    fn default() -> Self {
        Self {
            messages: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl MessageTable {
    /// Next message id. Strictly increasing and gap-free per success
    /// because allocation only ever happens under the table lock.
    fn allocate(&mut self) -> MessageId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

/// Contents of the mailbox table: per-receiver append-only queues.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MailboxTable {
    pub mailboxes: BTreeMap<String, Vec<MailboxEntry>>,
}

/// Orchestrates the token issuer, message store and mailbox router;
/// delegates moderation to the flag register.
pub struct MessagingService {
    tokens: TokenIssuer,
    token_table: Arc<Table<TokenTable>>,
    messages: Arc<Table<MessageTable>>,
    mailboxes: Arc<Table<MailboxTable>>,
    flags: FlagRegister,
    audit: Arc<dyn AuditSink>,
}

impl MessagingService {
    pub fn new(stores: &Stores, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            tokens: TokenIssuer::new(Arc::clone(&stores.tokens)),
            token_table: Arc::clone(&stores.tokens),
            messages: Arc::clone(&stores.messages),
            mailboxes: Arc::clone(&stores.mailboxes),
            flags: FlagRegister::new(Arc::clone(&stores.messages), Arc::clone(&stores.flags)),
            audit,
        }
    }

    /// Issue (or re-issue) the owner's single-use anonymity token.
    pub fn issue_token(&self, owner: &str) -> Result<Token> {
        let token = self.tokens.issue(owner)?;
        self.audit
            .record("token_generation", json!({ "username": owner }));
        Ok(token)
    }

    /// Create `receiver`'s mailbox if it does not exist yet.
    /// Idempotent; an existing mailbox keeps its entries.
    pub fn register_receiver(&self, receiver: &str) -> Result<()> {
        self.mailboxes.with_lock(|table| {
            table.mailboxes.entry(receiver.to_string()).or_default();
            Ok(())
        })
    }

    /// Send `content` to `receiver`, spending `token`.
    ///
    /// Token validation and consumption run as one transaction under
    /// the token table lock: two concurrent sends with the same token
    /// cannot both get through — at most one consumer per token. The
    /// spend is persisted before the message is stored, so a crash
    /// between the two stages costs the sender a token but can never
    /// leave a stored message whose token reads as unused.
    ///
    /// Delivery is best-effort: an unknown receiver fails with
    /// `UnknownReceiver` *after* the message is stored and the token
    /// spent, leaving the message in nobody's mailbox.
    pub fn send(
        &self,
        sender: &str,
        token: &str,
        content: &str,
        receiver: &str,
    ) -> Result<MessageId> {
        self.token_table.with_lock(|tokens| {
            // One check covers unknown, spent and wrong-owner tokens.
            if tokens.validate(token) != Some(sender) {
                return Err(Error::InvalidToken);
            }
            tokens.consume(token)
        })?;

        let message_id = self.messages.with_lock(|messages| {
            let id = messages.allocate();
            messages.messages.insert(
                id,
                Message {
                    id,
                    content: content.to_string(),
                    token: token.to_string(),
                    created_at: Utc::now(),
                    flagged: false,
                    read_by: Vec::new(),
                },
            );
            Ok(id)
        })?;

        self.mailboxes.with_lock(|table| {
            let mailbox = table
                .mailboxes
                .get_mut(receiver)
                .ok_or_else(|| Error::UnknownReceiver(receiver.to_string()))?;
            mailbox.push(MailboxEntry {
                message_id,
                received_at: Utc::now(),
                read: false,
            });
            Ok(())
        })?;

        self.audit.record(
            "message_sent",
            json!({ "username": sender, "message_id": message_id, "receiver": receiver }),
        );
        debug!(message_id, receiver, "message delivered");
        Ok(message_id)
    }

    /// Everything in `receiver`'s mailbox, oldest first.
    ///
    /// Unknown receivers get an empty list. Entries whose message has
    /// gone missing are skipped, not surfaced.
    pub fn list_messages(&self, receiver: &str) -> Result<Vec<MessageView>> {
        let entries = self
            .mailboxes
            .read(|table| table.mailboxes.get(receiver).cloned().unwrap_or_default())?;
        let views = self.messages.read(|table| {
            entries
                .iter()
                .filter_map(|entry| {
                    table.messages.get(&entry.message_id).map(|message| MessageView {
                        message_id: entry.message_id,
                        content: message.content.clone(),
                        created_at: message.created_at,
                        received_at: entry.received_at,
                        read: entry.read,
                        flagged: message.flagged,
                    })
                })
                .collect()
        })?;
        self.audit
            .record("messages_viewed", json!({ "username": receiver }));
        Ok(views)
    }

    /// Mark one delivered message read.
    ///
    /// Idempotent and safe to retry: unknown receivers and message ids
    /// are a no-op, never an error.
    pub fn mark_read(&self, receiver: &str, message_id: MessageId) -> Result<()> {
        self.mailboxes.with_lock(|table| {
            if let Some(mailbox) = table.mailboxes.get_mut(receiver) {
                if let Some(entry) = mailbox.iter_mut().find(|e| e.message_id == message_id) {
                    entry.read = true;
                }
            }
            Ok(())
        })?;
        self.audit.record(
            "message_read",
            json!({ "username": receiver, "message_id": message_id }),
        );
        Ok(())
    }

    /// Flag a message for review. See [`FlagRegister::flag`].
    pub fn flag(&self, moderator: &str, message_id: MessageId) -> Result<FlagId> {
        let flag_id = self.flags.flag(moderator, message_id)?;
        self.audit.record(
            "message_flagged",
            json!({ "username": moderator, "message_id": message_id, "flag_id": flag_id }),
        );
        Ok(flag_id)
    }
}
