//! # Domain Invariants
//!
//! Structural invariants of the message table. These are checked after
//! every applied admission in debug builds and whenever a ledger is
//! restored from storage.
//!
//! - INVARIANT-1: Dense ids
//! - INVARIANT-2: Depth consistency
//! - INVARIANT-3: No forward references
//!
//! INVARIANT-4 (rate window capacity) and INVARIANT-5 (lifecycle gate)
//! only hold at admission time and are enforced in `rate_limit.rs` and
//! `controller.rs`.

use super::entities::{MessageId, MAX_REPLY_DEPTH};
use super::store::MessageStore;
use std::collections::HashMap;

/// A violated invariant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvariantViolation {
    /// Message at arena position `position` carries id `id`.
    IdGap { position: u64, id: MessageId },
    /// `reply_to` names a message at or after the reply.
    ForwardReference { id: MessageId, reply_to: MessageId },
    /// Stored depth differs from the parent's depth + 1 (or 0).
    DepthMismatch {
        id: MessageId,
        expected: u32,
        actual: u32,
    },
    /// Stored depth is above the maximum.
    DepthExceeded { id: MessageId, depth: u32 },
    /// Reply index entry disagrees with the message table.
    ReplyIndexMismatch { parent: MessageId },
}

/// Result of checking all invariants.
#[derive(Clone, Debug, Default)]
pub struct InvariantCheckResult {
    pub violations: Vec<InvariantViolation>,
}

impl InvariantCheckResult {
    /// Returns true if no invariant is violated.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.violations.is_empty()
    }
}

/// INVARIANT-1: ids form `[0, next_id)` with no gaps.
#[must_use]
pub fn check_dense_ids(store: &MessageStore) -> Vec<InvariantViolation> {
    store
        .messages()
        .zip(0u64..)
        .filter(|(m, position)| m.id != *position)
        .map(|(m, position)| InvariantViolation::IdGap { position, id: m.id })
        .collect()
}

/// INVARIANT-2 and INVARIANT-3: every reply references an earlier message
/// and sits exactly one level below it.
#[must_use]
pub fn check_reply_links(store: &MessageStore) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    for message in store.messages() {
        if message.reply_depth > MAX_REPLY_DEPTH {
            violations.push(InvariantViolation::DepthExceeded {
                id: message.id,
                depth: message.reply_depth,
            });
        }

        let expected = match message.reply_to {
            None => 0,
            Some(parent_id) if parent_id >= message.id => {
                violations.push(InvariantViolation::ForwardReference {
                    id: message.id,
                    reply_to: parent_id,
                });
                continue;
            }
            Some(parent_id) => match store.depth(parent_id) {
                Some(parent_depth) => parent_depth + 1,
                None => {
                    violations.push(InvariantViolation::ForwardReference {
                        id: message.id,
                        reply_to: parent_id,
                    });
                    continue;
                }
            },
        };

        if message.reply_depth != expected {
            violations.push(InvariantViolation::DepthMismatch {
                id: message.id,
                expected,
                actual: message.reply_depth,
            });
        }
    }

    violations
}

/// The reply index lists exactly the replies of each parent, in id order.
#[must_use]
pub fn check_reply_index(store: &MessageStore) -> Vec<InvariantViolation> {
    let mut derived: HashMap<MessageId, Vec<MessageId>> = HashMap::new();
    for message in store.messages() {
        if let Some(parent) = message.reply_to {
            derived.entry(parent).or_default().push(message.id);
        }
    }

    let mut mismatched: Vec<MessageId> = store
        .reply_index()
        .filter(|(parent, children)| derived.get(*parent) != Some(*children))
        .map(|(parent, _)| *parent)
        .chain(
            derived
                .keys()
                .filter(|parent| store.replies(**parent).map_or(true, <[_]>::is_empty))
                .copied(),
        )
        .collect();
    mismatched.sort_unstable();
    mismatched.dedup();

    mismatched
        .into_iter()
        .map(|parent| InvariantViolation::ReplyIndexMismatch { parent })
        .collect()
}

/// Check all store invariants at once.
#[must_use]
pub fn check_all_invariants(store: &MessageStore) -> InvariantCheckResult {
    let mut violations = check_dense_ids(store);
    violations.extend(check_reply_links(store));
    violations.extend(check_reply_index(store));
    InvariantCheckResult { violations }
}
