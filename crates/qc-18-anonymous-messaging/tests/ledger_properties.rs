//! # Ledger Properties
//!
//! Randomized operation sequences, concurrent writers and restore from
//! storage, checked against the structural invariants of the ledger.

mod common;

use common::{deployer, initialized, wallet};
use qc_18_anonymous_messaging::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

fn content(rng: &mut StdRng) -> String {
    // Occasionally out of bounds on either side
    let len = match rng.gen_range(0..10) {
        0 => rng.gen_range(0..10),
        1 => rng.gen_range(501..520),
        _ => rng.gen_range(10..=500),
    };
    "m".repeat(len)
}

#[test]
fn test_random_operations_preserve_invariants() {
    let (service, clock) = initialized();
    let mut rng = StdRng::seed_from_u64(0x18);
    service.update_rate_limits(&deployer(), 20, 4).unwrap();

    let users: Vec<Principal> = (1..=4).map(wallet).collect();
    let mut expected_counts: HashMap<Principal, u64> = HashMap::new();
    let mut window_sends: HashMap<Principal, (u64, u64)> = HashMap::new();

    for _ in 0..600 {
        clock.advance(rng.gen_range(0..3));
        let user = &users[rng.gen_range(0..users.len())];
        let before = service.get_message_count();

        let (result, admitted, rate_limited) = match rng.gen_range(0..4) {
            0 => (
                service.send_anonymous_message(user, content(&mut rng)).map(|_| ()),
                1,
                false,
            ),
            1 => (
                service
                    .send_anonymous_message_with_category(user, content(&mut rng), None, rng.gen())
                    .map(|_| ()),
                1,
                true,
            ),
            2 => {
                let parent = rng.gen_range(0..before + 2);
                (
                    service
                        .reply_to_message(user, content(&mut rng), parent, rng.gen())
                        .map(|_| ()),
                    1,
                    true,
                )
            }
            _ => (
                service
                    .send_bulk_messages(user, content(&mut rng), content(&mut rng))
                    .map(|_| ()),
                2,
                false,
            ),
        };

        match result {
            Ok(()) => {
                assert_eq!(service.get_message_count(), before + admitted);
                *expected_counts.entry(user.clone()).or_default() += admitted;

                if rate_limited {
                    // Never more than max_per_window rate-limited sends per window
                    let record = service.get_rate_record(user).unwrap();
                    let entry = window_sends.entry(user.clone()).or_insert((record.window_start, 0));
                    if entry.0 != record.window_start {
                        *entry = (record.window_start, 0);
                    }
                    entry.1 += 1;
                    assert!(entry.1 <= 4);
                    assert_eq!(entry.1, record.count_in_window);
                }
            }
            Err(err) => {
                // Rejections change nothing
                assert_eq!(service.get_message_count(), before);
                assert_ne!(err.code(), 500);
            }
        }
    }

    let check = service.check_invariants();
    assert!(check.is_ok(), "violations: {:?}", check.violations);

    for user in &users {
        assert_eq!(
            service.get_user_message_count(user),
            expected_counts.get(user).copied().unwrap_or(0)
        );
    }

    // Every reply's depth is one more than its parent's and listed under it
    for id in 0..service.get_message_count() {
        let message = service.get_message(id).unwrap();
        assert_eq!(message.id, id);
        assert_eq!(message.sender, None);
        assert!(message.reply_depth <= MAX_REPLY_DEPTH);
        if let Some(parent) = message.reply_to {
            assert!(parent < id);
            assert_eq!(
                service.get_message_depth(parent).map(|d| d + 1),
                Some(message.reply_depth)
            );
            assert!(service.get_message_replies(parent).unwrap().contains(&id));
        }
    }
}

#[test]
fn test_concurrent_writers_get_unique_dense_ids() {
    let (service, _) = initialized();
    let service = Arc::new(service);

    let handles: Vec<_> = (1..=8u8)
        .map(|n| {
            let service = Arc::clone(&service);
            thread::spawn(move || {
                let user = wallet(n);
                let mut ids = Vec::new();
                for i in 0..50 {
                    let text = format!("wallet {n} says hello number {i}");
                    ids.push(service.send_anonymous_message(&user, text).unwrap());
                }
                let bulk = service
                    .send_bulk_messages(
                        &user,
                        "bulk message one of two".into(),
                        "bulk message two of two".into(),
                    )
                    .unwrap();
                assert_eq!(bulk.second_id, bulk.first_id + 1);
                ids.extend([bulk.first_id, bulk.second_id]);
                ids
            })
        })
        .collect();

    let mut all: Vec<MessageId> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    all.sort_unstable();

    let expected: Vec<MessageId> = (0..8 * 52).collect();
    assert_eq!(all, expected);
    assert_eq!(service.get_message_count(), 8 * 52);
    assert!(service.check_invariants().is_ok());
    for n in 1..=8u8 {
        assert_eq!(service.get_user_message_count(&wallet(n)), 52);
    }
}

#[test]
fn test_concurrent_rate_limited_senders_respect_capacity() {
    let (service, _) = initialized();
    service.update_rate_limits(&deployer(), 1_000_000, 5).unwrap();
    let service = Arc::new(service);
    let user = wallet(1);

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let service = Arc::clone(&service);
            let user = user.clone();
            thread::spawn(move || {
                service
                    .send_anonymous_message_with_category(
                        &user,
                        "racing for the same window".into(),
                        None,
                        false,
                    )
                    .is_ok()
            })
        })
        .collect();

    let admitted = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();
    assert_eq!(admitted, 5);
    assert_eq!(service.get_rate_record(&user).unwrap().count_in_window, 5);
}

#[test]
fn test_restore_continues_where_it_left_off() {
    common::init_tracing();
    let clock = ManualClock::new(50);
    let kv = InMemoryKVStore::new();
    let service = AnonymityService::new(ServiceConfig::new(deployer()), clock.clone(), kv).unwrap();
    service.initialize(&deployer()).unwrap();
    service.update_rate_limits(&deployer(), 100, 2).unwrap();

    let user = wallet(1);
    service
        .send_anonymous_message_with_category(&user, "before the restart".into(), None, false)
        .unwrap();
    service
        .reply_to_message(&user, "a reply before restart".into(), 0, false)
        .unwrap();
    service.pause_service(&deployer()).unwrap();

    // Rebuild from a snapshot of the persisted records
    let snapshot = persisted_snapshot(&service);
    let reopened =
        AnonymityService::open(ServiceConfig::new(deployer()), clock.clone(), snapshot).unwrap();

    assert_eq!(reopened.get_service_status(), service.get_service_status());
    assert_eq!(reopened.get_message_replies(0), Some(vec![1]));
    assert_eq!(reopened.get_user_message_count(&user), 2);
    assert_eq!(
        reopened.send_anonymous_message(&user, "still paused after restart".into()),
        Err(AnonymityError::NotInitialized)
    );

    reopened.resume_service(&deployer()).unwrap();
    assert!(matches!(
        reopened.reply_to_message(&user, "window is still full".into(), 1, false),
        Err(AnonymityError::RateLimitExceeded { count: 2, max: 2 })
    ));
    assert_eq!(
        reopened.send_anonymous_message(&user, "ids continue after restart".into()),
        Ok(2)
    );
}

/// Copies every persisted record into a fresh store.
fn persisted_snapshot<T: TimeSource>(
    service: &AnonymityService<T, InMemoryKVStore>,
) -> InMemoryKVStore {
    let mut copy = InMemoryKVStore::new();
    service.with_store(|kv| {
        for prefix in [&b"svc/"[..], b"msg/", b"rep/", b"rate/", b"cnt/"] {
            for (key, value) in kv.prefix_scan(prefix).unwrap() {
                copy.put(&key, &value).unwrap();
            }
        }
    });
    copy
}
