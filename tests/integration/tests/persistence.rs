//! File-backed stores must survive a full close-and-reopen, and stay
//! coherent between compositions that are open at the same time — the
//! two ways separate CLI invocations see them.

use std::sync::Arc;

use whisper_core::audit::MemoryAuditSink;
use whisper_core::messaging::MessagingService;
use whisper_core::store::Stores;
use whisper_core::Error;

fn service(dir: &std::path::Path) -> MessagingService {
    let stores = Stores::open(dir).unwrap();
    MessagingService::new(&stores, Arc::new(MemoryAuditSink::default()))
}

#[test]
fn state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();

    let token = {
        let service = service(dir.path());
        service.register_receiver("bob").unwrap();
        let token = service.issue_token("alice").unwrap();
        service.send("alice", &token.value, "persisted", "bob").unwrap();
        token
    };

    // A fresh composition over the same directory sees everything.
    let reopened = service(dir.path());
    let views = reopened.list_messages("bob").unwrap();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].content, "persisted");

    // The spent token is still spent in the new process.
    assert!(matches!(
        reopened.send("alice", &token.value, "replay", "bob"),
        Err(Error::InvalidToken)
    ));
}

#[test]
fn read_state_and_flags_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();

    let id = {
        let service = service(dir.path());
        service.register_receiver("bob").unwrap();
        let token = service.issue_token("alice").unwrap();
        let id = service.send("alice", &token.value, "hi", "bob").unwrap();
        service.mark_read("bob", id).unwrap();
        service.flag("mallory", id).unwrap();
        id
    };

    let reopened = service(dir.path());
    let views = reopened.list_messages("bob").unwrap();
    assert!(views[0].read);
    assert!(views[0].flagged);
    assert!(matches!(
        reopened.flag("mod2", id),
        Err(Error::AlreadyFlagged(_))
    ));
}

#[test]
fn concurrent_handles_share_one_token_pool() {
    let dir = tempfile::tempdir().unwrap();

    // Two live compositions over one directory, as two simultaneous
    // CLI processes would have. Neither is reopened in between.
    let first = service(dir.path());
    let second = service(dir.path());

    first.register_receiver("bob").unwrap();
    let token = first.issue_token("alice").unwrap();

    // The token has exactly one consumer across both handles.
    assert_eq!(first.send("alice", &token.value, "one", "bob").unwrap(), 1);
    assert!(matches!(
        second.send("alice", &token.value, "double spend", "bob"),
        Err(Error::InvalidToken)
    ));

    // Id allocation is shared too: the second handle continues the
    // sequence instead of handing out 1 again.
    let token = second.issue_token("carol").unwrap();
    assert_eq!(second.send("carol", &token.value, "two", "bob").unwrap(), 2);

    // And the mailbox read back through the first handle has both.
    let contents: Vec<String> = first
        .list_messages("bob")
        .unwrap()
        .into_iter()
        .map(|v| v.content)
        .collect();
    assert_eq!(contents, ["one", "two"]);
}

#[test]
fn id_allocation_continues_after_reopen() {
    let dir = tempfile::tempdir().unwrap();

    {
        let service = service(dir.path());
        service.register_receiver("bob").unwrap();
        let token = service.issue_token("alice").unwrap();
        assert_eq!(service.send("alice", &token.value, "one", "bob").unwrap(), 1);
    }

    let reopened = service(dir.path());
    let token = reopened.issue_token("alice").unwrap();
    assert_eq!(
        reopened.send("alice", &token.value, "two", "bob").unwrap(),
        2,
        "ids must keep increasing across restarts"
    );
}
