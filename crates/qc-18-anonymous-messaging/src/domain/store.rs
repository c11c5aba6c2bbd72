//! # Message Store - Append-Only Arena with Reply Index
//!
//! ## Data Structures
//!
//! - `messages`: arena indexed by `MessageId` (ids are dense, so index == id)
//! - `replies`: parent id → direct reply ids in insertion order
//! - `user_counts`: lifetime messages attributed to each identity
//!
//! ## Invariants Enforced
//!
//! - INVARIANT-1: ids form `[0, next_id)` with no gaps (`apply()` appends only)
//! - INVARIANT-2: `reply_depth == parent.reply_depth + 1` (`prepare_append()`)
//! - INVARIANT-3: `reply_to` must already exist (`prepare_append()` lookup)
//!
//! Cycles are impossible by construction: a reply can only reference a
//! message with a strictly smaller id.

use super::entities::{Message, MessageId, Principal, Timestamp, MAX_REPLY_DEPTH};
use super::errors::AnonymityError;
use super::validation::ContentPolicy;
use super::value_objects::{Admission, NewMessage};
use std::collections::HashMap;

/// Append-only message table.
#[derive(Clone, Debug, Default)]
pub struct MessageStore {
    policy: ContentPolicy,
    messages: Vec<Message>,
    replies: HashMap<MessageId, Vec<MessageId>>,
    user_counts: HashMap<Principal, u64>,
}

impl MessageStore {
    /// Creates an empty store.
    pub fn new(policy: ContentPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Rebuilds a store from persisted records.
    ///
    /// `messages` must be sorted by id. Callers are expected to run
    /// `invariants::check_all_invariants` on the result.
    pub fn restore(
        policy: ContentPolicy,
        messages: Vec<Message>,
        replies: HashMap<MessageId, Vec<MessageId>>,
        user_counts: HashMap<Principal, u64>,
    ) -> Self {
        Self {
            policy,
            messages,
            replies,
            user_counts,
        }
    }

    /// Id the next admitted message will receive.
    pub fn next_id(&self) -> MessageId {
        self.messages.len() as MessageId
    }

    // =========================================================================
    // ADMISSION (two-phase)
    // =========================================================================

    /// Validates a single message and computes everything its admission writes.
    ///
    /// Check order: parent lookup, reply depth, content length.
    ///
    /// # Errors
    /// - `MessageNotFound` if `reply_to` names a message that does not exist
    /// - `InvalidReplyDepth` if the resulting depth exceeds `MAX_REPLY_DEPTH`
    /// - `InvalidMessageLength` if content fails validation
    pub fn prepare_append(
        &self,
        new: NewMessage,
        author: &Principal,
        now: Timestamp,
    ) -> Result<Admission, AnonymityError> {
        let id = self.next_id();

        let (reply_depth, parent_replies) = match new.reply_to {
            Some(parent_id) => {
                let parent = self
                    .get(parent_id)
                    .ok_or(AnonymityError::MessageNotFound(parent_id))?;
                let depth = parent.reply_depth + 1;
                if depth > MAX_REPLY_DEPTH {
                    return Err(AnonymityError::InvalidReplyDepth {
                        depth,
                        max: MAX_REPLY_DEPTH,
                    });
                }
                let mut siblings = self.replies(parent_id).map(<[_]>::to_vec).unwrap_or_default();
                siblings.push(id);
                (depth, Some((parent_id, siblings)))
            }
            None => (0, None),
        };

        self.policy.check(&new.content)?;

        Ok(Admission {
            messages: vec![Message {
                id,
                content: new.content,
                sender: None,
                category: new.category,
                encrypted: new.encrypted,
                reply_to: new.reply_to,
                reply_depth,
                created_at: now,
            }],
            parent_replies,
            author: author.clone(),
            author_count: self.user_count(author) + 1,
            rate: None,
        })
    }

    /// Validates two top-level messages as one atomic unit.
    ///
    /// # Errors
    /// - `InvalidMessageLength` for the first content that fails validation;
    ///   neither message is admitted
    pub fn prepare_bulk(
        &self,
        first: &str,
        second: &str,
        author: &Principal,
        now: Timestamp,
    ) -> Result<Admission, AnonymityError> {
        self.policy.check(first)?;
        self.policy.check(second)?;

        let first_id = self.next_id();
        let messages = [first, second]
            .into_iter()
            .zip(first_id..)
            .map(|(content, id)| Message {
                id,
                content: content.to_string(),
                sender: None,
                category: None,
                encrypted: false,
                reply_to: None,
                reply_depth: 0,
                created_at: now,
            })
            .collect();

        Ok(Admission {
            messages,
            parent_replies: None,
            author: author.clone(),
            author_count: self.user_count(author) + 2,
            rate: None,
        })
    }

    /// Writes an admission produced by `prepare_append`/`prepare_bulk`.
    ///
    /// Must be applied against the same store state it was prepared on.
    pub fn apply(&mut self, admission: Admission) {
        debug_assert_eq!(admission.first_id(), Some(self.next_id()));

        for message in admission.messages {
            if let Some(parent_id) = message.reply_to {
                self.replies.entry(parent_id).or_default().push(message.id);
            }
            self.messages.push(message);
        }
        self.user_counts
            .insert(admission.author, admission.author_count);
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Gets a message by id.
    pub fn get(&self, id: MessageId) -> Option<&Message> {
        usize::try_from(id).ok().and_then(|i| self.messages.get(i))
    }

    /// Checks if a message exists.
    pub fn contains(&self, id: MessageId) -> bool {
        id < self.next_id()
    }

    /// Total messages ever created.
    pub fn len(&self) -> u64 {
        self.next_id()
    }

    /// Returns true if no message was created yet.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Number of messages with ids in `[from, to)`.
    ///
    /// # Errors
    /// - `InvalidRange` if `from > to` or `to >= next_id`
    pub fn count_range(&self, from: MessageId, to: MessageId) -> Result<u64, AnonymityError> {
        let count = self.next_id();
        if from > to || to >= count {
            return Err(AnonymityError::InvalidRange { from, to, count });
        }
        // Bounds checked above, both fit in the arena
        Ok(self.messages[from as usize..to as usize].len() as u64)
    }

    /// Id of the most recently created message.
    ///
    /// # Errors
    /// - `NoMessages` if the store is empty
    pub fn last_id(&self) -> Result<MessageId, AnonymityError> {
        self.messages
            .last()
            .map(|m| m.id)
            .ok_or(AnonymityError::NoMessages)
    }

    /// Stored reply depth of a message.
    pub fn depth(&self, id: MessageId) -> Option<u32> {
        self.get(id).map(|m| m.reply_depth)
    }

    /// Direct replies of an existing message, in insertion order.
    pub fn replies(&self, id: MessageId) -> Option<&[MessageId]> {
        if !self.contains(id) {
            return None;
        }
        Some(self.replies.get(&id).map(Vec::as_slice).unwrap_or(&[]))
    }

    /// Lifetime message count attributed to `who`.
    pub fn user_count(&self, who: &Principal) -> u64 {
        self.user_counts.get(who).copied().unwrap_or(0)
    }

    /// Iterates over all messages in id order.
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    /// Iterates over the reply index.
    pub fn reply_index(&self) -> impl Iterator<Item = (&MessageId, &Vec<MessageId>)> {
        self.replies.iter()
    }
}
