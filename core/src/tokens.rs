//! Single-use anonymity tokens.
//!
//! A token decouples a sender's authenticated identity from the act of
//! sending one specific message. Each owner holds at most one unused
//! token at a time; consuming it is one-way and final.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::debug;
use whisper_common::token::{IssuanceRecord, Token};

use crate::error::{Error, Result};
use crate::store::Table;

/// Contents of the token table.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TokenTable {
    /// Every token ever issued, keyed by value. Never pruned: a spent
    /// token must keep failing validation forever.
    pub tokens: BTreeMap<String, Token>,
    /// Append-only issuance ledger. Audit/debug only.
    pub issued: Vec<IssuanceRecord>,
}

impl TokenTable {
    /// Owner of `value` iff the token exists and is unused.
    pub fn validate(&self, value: &str) -> Option<&str> {
        self.tokens
            .get(value)
            .filter(|t| !t.used)
            .map(|t| t.owner.as_str())
    }

    /// Flip `used` false→true. Unknown and already-used tokens fail
    /// identically: a replayed token must look no different from a
    /// fabricated one.
    pub fn consume(&mut self, value: &str) -> Result<()> {
        match self.tokens.get_mut(value) {
            Some(token) if !token.used => {
                token.used = true;
                Ok(())
            }
            _ => Err(Error::InvalidToken),
        }
    }

    fn unused_for(&self, owner: &str) -> Option<&Token> {
        self.tokens.values().find(|t| t.owner == owner && !t.used)
    }

    /// Insert a freshly generated token, refusing to overwrite on a
    /// value collision, and append it to the issuance ledger.
    fn insert_fresh(&mut self, owner: &str, value: String) -> Result<Token> {
        if self.tokens.contains_key(&value) {
            return Err(Error::TokenCollision);
        }
        let token = Token {
            value: value.clone(),
            owner: owner.to_string(),
            issued_at: Utc::now(),
            used: false,
        };
        self.issued.push(IssuanceRecord {
            issued_at: token.issued_at,
            owner: owner.to_string(),
            token: value.clone(),
        });
        self.tokens.insert(value, token.clone());
        Ok(token)
    }
}

/// Issues, validates and consumes anonymity tokens.
pub struct TokenIssuer {
    table: Arc<Table<TokenTable>>,
}

impl TokenIssuer {
    pub fn new(table: Arc<Table<TokenTable>>) -> Self {
        Self { table }
    }

    /// Issue a token for `owner`.
    ///
    /// Idempotent while the owner's current token is unused: the same
    /// token comes back instead of piling up unconsumed ones. Only a
    /// freshly generated token is appended to the issuance ledger.
    pub fn issue(&self, owner: &str) -> Result<Token> {
        self.table.with_lock(|table| {
            if let Some(existing) = table.unused_for(owner) {
                return Ok(existing.clone());
            }
            let token = table.insert_fresh(owner, fresh_value())?;
            debug!(owner, "issued fresh token");
            Ok(token)
        })
    }

    /// Read-only probe: the owning identity iff the token exists and
    /// is unused. Repeated calls on the same unused token keep
    /// returning the same owner.
    pub fn validate(&self, value: &str) -> Result<Option<String>> {
        self.table
            .read(|table| table.validate(value).map(str::to_string))
    }

    /// Consume a token outside of `send`.
    pub fn consume(&self, value: &str) -> Result<()> {
        self.table.with_lock(|table| table.consume(value))
    }
}

/// 32 bytes from the OS CSPRNG, hex-encoded. Unique by construction;
/// the caller still checks before insert and refuses to overwrite.
fn fresh_value() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
