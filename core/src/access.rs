//! Role-based authorization gate.

use std::sync::Arc;

use whisper_common::identity::{Permission, Role};

/// Source of truth for identity → role lookups.
///
/// Infallible by design: anything that prevents a lookup reads as
/// "unknown identity", which fails closed at the gate.
pub trait RoleProvider: Send + Sync {
    fn role_of(&self, identity: &str) -> Option<Role>;
}

/// Decides whether an identity may invoke a gated operation.
///
/// Decisions are a pure function of (current role, permission):
/// no side effects, nothing cached between calls. Callers check the
/// gate explicitly before each gated operation — the service itself
/// does not re-check.
pub struct AccessControl {
    roles: Arc<dyn RoleProvider>,
}

impl AccessControl {
    pub fn new(roles: Arc<dyn RoleProvider>) -> Self {
        Self { roles }
    }

    /// `true` iff the identity's current role grants `permission`.
    /// Unknown identities are denied, never an error.
    pub fn authorize(&self, identity: &str, permission: Permission) -> bool {
        self.roles
            .role_of(identity)
            .is_some_and(|role| role.allows(permission))
    }

    /// The full granted set, for introspection and audit display.
    /// Empty for unknown identities.
    pub fn permissions_of(&self, identity: &str) -> Vec<Permission> {
        self.roles
            .role_of(identity)
            .map(|role| role.grants().to_vec())
            .unwrap_or_default()
    }
}
