use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single-use anonymity token bound to the sender it was issued to.
///
/// `used` flips false→true exactly once, at consume time, and never
/// back. Tokens are never deleted; a spent token stays in the table so
/// replays keep failing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// Opaque unique value (hex of 32 CSPRNG bytes).
    pub value: String,
    pub owner: String,
    pub issued_at: DateTime<Utc>,
    pub used: bool,
}

/// One line of the issuance ledger. Audit/debug only — validation
/// never consults this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuanceRecord {
    pub issued_at: DateTime<Utc>,
    pub owner: String,
    pub token: String,
}
