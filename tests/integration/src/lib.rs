//! Shared harness for the integration tests: composes the full
//! messaging subsystem the way a front end would, over in-memory
//! stores, with a canned set of registered identities.

use std::collections::BTreeMap;
use std::sync::Arc;

use whisper_common::identity::Role;
use whisper_core::access::{AccessControl, RoleProvider};
use whisper_core::audit::MemoryAuditSink;
use whisper_core::messaging::MessagingService;
use whisper_core::store::Stores;

/// Role lookup backed by a fixed map.
#[derive(Default)]
pub struct StaticRoles {
    roles: BTreeMap<String, Role>,
}

impl StaticRoles {
    pub fn with(mut self, identity: &str, role: Role) -> Self {
        self.roles.insert(identity.to_string(), role);
        self
    }
}

impl RoleProvider for StaticRoles {
    fn role_of(&self, identity: &str) -> Option<Role> {
        self.roles.get(identity).copied()
    }
}

/// The composed subsystem plus handles the tests poke at.
pub struct TestWorld {
    pub service: MessagingService,
    pub access: AccessControl,
    pub audit: Arc<MemoryAuditSink>,
}

/// "alice" is a Sender, "bob" a Receiver with a registered mailbox,
/// "mallory" a Moderator.
pub fn world() -> TestWorld {
    let stores = Stores::in_memory();
    let audit = Arc::new(MemoryAuditSink::default());
    let service = MessagingService::new(&stores, audit.clone());
    let access = AccessControl::new(Arc::new(
        StaticRoles::default()
            .with("alice", Role::Sender)
            .with("bob", Role::Receiver)
            .with("mallory", Role::Moderator),
    ));
    service.register_receiver("bob").expect("mailbox");
    TestWorld {
        service,
        access,
        audit,
    }
}
