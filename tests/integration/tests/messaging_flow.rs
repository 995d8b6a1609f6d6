//! End-to-end flows through the composed subsystem, gated the way a
//! front end gates them.

use whisper_common::identity::Permission;
use whisper_core::Error;
use whisper_integration::world;

#[test]
fn full_send_view_read_flag_flow() {
    tracing_subscriber::fmt::try_init().ok();
    let w = world();

    // Sender side: gate, token, send.
    assert!(w.access.authorize("alice", Permission::GetToken));
    let token = w.service.issue_token("alice").unwrap();
    assert!(w.access.authorize("alice", Permission::SendMessage));
    let id = w
        .service
        .send("alice", &token.value, "meet me at noon", "bob")
        .unwrap();

    // Receiver side: gate, view, mark read.
    assert!(w.access.authorize("bob", Permission::ViewMessages));
    let views = w.service.list_messages("bob").unwrap();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].content, "meet me at noon");
    assert!(!views[0].read);
    w.service.mark_read("bob", id).unwrap();
    assert!(w.service.list_messages("bob").unwrap()[0].read);

    // Moderator side: gate, flag, flag-once.
    assert!(w.access.authorize("mallory", Permission::FlagMessage));
    let flag_id = w.service.flag("mallory", id).unwrap();
    assert_eq!(flag_id, 1);
    assert!(matches!(
        w.service.flag("mallory", id),
        Err(Error::AlreadyFlagged(_))
    ));
    assert!(w.service.list_messages("bob").unwrap()[0].flagged);
}

#[test]
fn role_gate_blocks_cross_role_operations() {
    let w = world();

    // Receivers cannot obtain tokens or send; senders cannot view or
    // flag; unknown identities can do nothing.
    assert!(!w.access.authorize("bob", Permission::GetToken));
    assert!(!w.access.authorize("bob", Permission::SendMessage));
    assert!(!w.access.authorize("alice", Permission::ViewMessages));
    assert!(!w.access.authorize("alice", Permission::FlagMessage));
    assert!(!w.access.authorize("mallory", Permission::SendMessage));
    assert!(!w.access.authorize("nobody", Permission::ViewMessages));
    assert!(w.access.permissions_of("nobody").is_empty());
}

#[test]
fn token_is_single_use_across_the_service() {
    let w = world();

    let token = w.service.issue_token("alice").unwrap();
    // Re-issue before consumption returns the identical token.
    assert_eq!(w.service.issue_token("alice").unwrap(), token);

    w.service.send("alice", &token.value, "hi", "bob").unwrap();
    assert!(matches!(
        w.service.send("alice", &token.value, "hi2", "bob"),
        Err(Error::InvalidToken)
    ));

    // After consumption a fresh issue produces a different token.
    let next = w.service.issue_token("alice").unwrap();
    assert_ne!(next.value, token.value);
}

#[test]
fn unknown_receiver_fails_but_spends_the_token() {
    let w = world();

    let token = w.service.issue_token("alice").unwrap();
    assert!(matches!(
        w.service.send("alice", &token.value, "hi", "carol"),
        Err(Error::UnknownReceiver(_))
    ));

    // The token cannot be replayed at a valid receiver afterwards.
    assert!(matches!(
        w.service.send("alice", &token.value, "hi", "bob"),
        Err(Error::InvalidToken)
    ));
    assert!(w.service.list_messages("bob").unwrap().is_empty());
}
