//! Races on the shared stores: the subsystem's central correctness
//! property is at most one consumer per token, and its twin for flags.

use std::sync::Barrier;
use std::thread;

use whisper_core::Error;
use whisper_integration::world;

#[test]
fn concurrent_sends_with_one_token_have_one_winner() {
    let w = world();
    let token = w.service.issue_token("alice").unwrap();

    let barrier = Barrier::new(2);
    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..2)
            .map(|i| {
                let service = &w.service;
                let barrier = &barrier;
                let value = token.value.clone();
                s.spawn(move || {
                    barrier.wait();
                    service.send("alice", &value, &format!("attempt {i}"), "bob")
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let ok = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(ok, 1, "exactly one send may consume the token");
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(Error::InvalidToken))));
    assert_eq!(w.service.list_messages("bob").unwrap().len(), 1);
}

#[test]
fn concurrent_flags_on_one_message_have_one_winner() {
    let w = world();
    let token = w.service.issue_token("alice").unwrap();
    let id = w.service.send("alice", &token.value, "rude", "bob").unwrap();

    let barrier = Barrier::new(2);
    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = ["mod1", "mod2"]
            .map(|moderator| {
                let service = &w.service;
                let barrier = &barrier;
                s.spawn(move || {
                    barrier.wait();
                    service.flag(moderator, id)
                })
            })
            .into_iter()
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let ok = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(ok, 1, "exactly one moderator may flag the message");
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(Error::AlreadyFlagged(_)))));
}

#[test]
fn ids_stay_strictly_increasing_under_interleaving() {
    let w = world();

    let mut ids = Vec::new();
    for i in 0..4 {
        let sender = format!("sender{i}");
        let token = w.service.issue_token(&sender).unwrap();
        ids.push(w.service.send(&sender, &token.value, "m", "bob").unwrap());
    }
    assert!(ids.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(ids, vec![1, 2, 3, 4]);
}

#[test]
fn parallel_senders_never_share_ids() {
    let w = world();

    let ids: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let service = &w.service;
                s.spawn(move || {
                    let sender = format!("sender{i}");
                    let token = service.issue_token(&sender).unwrap();
                    service.send(&sender, &token.value, "m", "bob").unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let mut sorted = ids.clone();
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(sorted.len(), 8, "all message ids must be distinct");
    assert_eq!(w.service.list_messages("bob").unwrap().len(), 8);
}
