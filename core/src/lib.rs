//! WhisperChain core: the anonymous-token-gated messaging subsystem.
//!
//! Registered senders spend a single-use anonymity token to deliver a
//! message into a receiver's mailbox; moderators flag abusive messages;
//! every sensitive action lands in an append-only audit trail.
//!
//! Components, leaf first:
//!
//! - [`access`]: role → permission gate over an injected role provider
//! - [`tokens`]: token issuance, validation and single-use consumption
//! - [`messaging`]: message store, mailbox router and the orchestrating
//!   service
//! - [`flags`]: moderation flags, at most one per message
//! - [`store`]: bounded-wait transactional table wrapper shared by all
//!   of the above
//! - [`audit`]: audit sink trait plus file-backed and in-memory sinks
//!
//! Identity/role lookup and audit recording are collaborator seams
//! ([`access::RoleProvider`], [`audit::AuditSink`]); everything else is
//! owned state. Store handles are built once at the composition root
//! ([`store::Stores`]) and injected into the components.

pub mod access;
pub mod audit;
pub mod error;
pub mod flags;
pub mod messaging;
pub mod store;
pub mod tokens;

pub use error::{Error, Result};
