use std::io;

use thiserror::Error;
use whisper_common::message::MessageId;

/// Errors surfaced by the messaging core.
///
/// `InvalidToken` deliberately covers unknown, already-used and
/// wrong-owner tokens in one kind: if callers could tell *why* a token
/// failed, the anonymity of earlier sends would erode. Splitting it is
/// a policy decision, not a refactor.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid or already used token")]
    InvalidToken,

    #[error("receiver '{0}' does not exist")]
    UnknownReceiver(String),

    #[error("message {0} does not exist")]
    UnknownMessage(MessageId),

    #[error("message {0} is already flagged")]
    AlreadyFlagged(MessageId),

    /// A freshly generated token value already exists. With 256 bits
    /// of entropy this should never fire; refuse to overwrite if it
    /// does.
    #[error("generated token value collides with an existing token")]
    TokenCollision,

    /// Bounded lock wait on a table expired.
    #[error("table '{0}' is busy, try again")]
    Busy(&'static str),

    #[error("storage failure on table '{table}'")]
    Storage {
        table: &'static str,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
