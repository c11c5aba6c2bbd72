//! # Ledger Persistence Codec
//!
//! Maps ledger records onto key-value pairs. Values are bincode.
//!
//! | Key | Value |
//! |-----|-------|
//! | `svc/state` | `ServiceState` |
//! | `msg/{id:be64}` | `Message` |
//! | `rep/{parent:be64}` | `Vec<MessageId>` |
//! | `rate/{principal}` | `RateRecord` |
//! | `cnt/{principal}` | `u64` |
//!
//! Big-endian ids keep `msg/` and `rep/` scans in id order on ordered stores.
//! The next id is not stored; it is the number of `msg/` records.

use crate::domain::controller::ServiceController;
use crate::domain::entities::{Message, MessageId, Principal, RateRecord, ServiceState};
use crate::domain::errors::{AnonymityError, KVStoreError};
use crate::domain::invariants::check_all_invariants;
use crate::domain::ledger::MessageLedger;
use crate::domain::rate_limit::RateLimiter;
use crate::domain::store::MessageStore;
use crate::domain::validation::ContentPolicy;
use crate::domain::value_objects::{Admission, RateLimits};
use crate::ports::outbound::{BatchOperation, KeyValueStore};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;

/// Key namespaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyPrefix {
    /// Service state singleton
    Service,
    /// Message records by id
    Message,
    /// Reply lists by parent id
    Replies,
    /// Rate records by identity
    Rate,
    /// Lifetime message counts by identity
    Count,
}

impl KeyPrefix {
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            KeyPrefix::Service => b"svc/",
            KeyPrefix::Message => b"msg/",
            KeyPrefix::Replies => b"rep/",
            KeyPrefix::Rate => b"rate/",
            KeyPrefix::Count => b"cnt/",
        }
    }

    /// Build a full key with the given suffix.
    pub fn key(&self, suffix: &[u8]) -> Vec<u8> {
        let mut key = self.as_bytes().to_vec();
        key.extend_from_slice(suffix);
        key
    }

    pub fn state_key() -> Vec<u8> {
        KeyPrefix::Service.key(b"state")
    }

    pub fn message_key(id: MessageId) -> Vec<u8> {
        KeyPrefix::Message.key(&id.to_be_bytes())
    }

    pub fn replies_key(parent: MessageId) -> Vec<u8> {
        KeyPrefix::Replies.key(&parent.to_be_bytes())
    }

    pub fn rate_key(who: &Principal) -> Vec<u8> {
        KeyPrefix::Rate.key(who.as_str().as_bytes())
    }

    pub fn count_key(who: &Principal) -> Vec<u8> {
        KeyPrefix::Count.key(who.as_str().as_bytes())
    }

    /// Strips this prefix from `key`.
    fn suffix<'a>(&self, key: &'a [u8]) -> Result<&'a [u8], KVStoreError> {
        key.strip_prefix(self.as_bytes())
            .ok_or_else(|| corruption(format!("key outside {:?} namespace", self)))
    }
}

fn corruption(message: impl Into<String>) -> KVStoreError {
    KVStoreError::CorruptionError {
        message: message.into(),
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, AnonymityError> {
    bincode::serialize(value).map_err(|e| AnonymityError::Storage(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8], what: &str) -> Result<T, KVStoreError> {
    bincode::deserialize(bytes).map_err(|e| corruption(format!("undecodable {what}: {e}")))
}

fn id_suffix(prefix: KeyPrefix, key: &[u8]) -> Result<MessageId, KVStoreError> {
    let bytes: [u8; 8] = prefix
        .suffix(key)?
        .try_into()
        .map_err(|_| corruption("malformed id key"))?;
    Ok(MessageId::from_be_bytes(bytes))
}

fn principal_suffix(prefix: KeyPrefix, key: &[u8]) -> Result<Principal, KVStoreError> {
    let raw = prefix.suffix(key)?;
    std::str::from_utf8(raw)
        .map(Principal::new)
        .map_err(|_| corruption("non-utf8 principal key"))
}

// =============================================================================
// ENCODING
// =============================================================================

/// Batch persisting a new service state.
pub fn state_batch(state: &ServiceState) -> Result<Vec<BatchOperation>, AnonymityError> {
    Ok(vec![BatchOperation::put(
        KeyPrefix::state_key(),
        encode(state)?,
    )])
}

/// Batch persisting every record an admission writes.
pub fn admission_batch(admission: &Admission) -> Result<Vec<BatchOperation>, AnonymityError> {
    let mut ops = Vec::with_capacity(admission.messages.len() + 3);

    for message in &admission.messages {
        ops.push(BatchOperation::put(
            KeyPrefix::message_key(message.id),
            encode(message)?,
        ));
    }
    if let Some((parent, children)) = &admission.parent_replies {
        ops.push(BatchOperation::put(
            KeyPrefix::replies_key(*parent),
            encode(children)?,
        ));
    }
    ops.push(BatchOperation::put(
        KeyPrefix::count_key(&admission.author),
        encode(&admission.author_count)?,
    ));
    if let Some(record) = &admission.rate {
        ops.push(BatchOperation::put(
            KeyPrefix::rate_key(&admission.author),
            encode(record)?,
        ));
    }

    Ok(ops)
}

// =============================================================================
// DECODING
// =============================================================================

/// Rebuilds a ledger from storage.
///
/// Returns `None` when no service state was ever written. The message
/// table must be dense and pass every store invariant, otherwise the
/// storage is reported as corrupt.
pub fn load_ledger<K: KeyValueStore + ?Sized>(
    kv: &K,
    policy: ContentPolicy,
    initial_fee: u64,
    initial_limits: RateLimits,
) -> Result<Option<MessageLedger>, AnonymityError> {
    let Some(raw_state) = kv.get(&KeyPrefix::state_key())? else {
        return Ok(None);
    };
    let state: ServiceState = decode(&raw_state, "service state")?;

    let mut messages = Vec::new();
    for (key, value) in kv.prefix_scan(KeyPrefix::Message.as_bytes())? {
        let id = id_suffix(KeyPrefix::Message, &key)?;
        let message: Message = decode(&value, "message")?;
        if message.id != id {
            return Err(corruption(format!("message {} stored under key {id}", message.id)).into());
        }
        messages.push(message);
    }
    messages.sort_by_key(|m| m.id);

    let mut replies = HashMap::new();
    for (key, value) in kv.prefix_scan(KeyPrefix::Replies.as_bytes())? {
        let parent = id_suffix(KeyPrefix::Replies, &key)?;
        let children: Vec<MessageId> = decode(&value, "reply list")?;
        replies.insert(parent, children);
    }

    let mut counts = HashMap::new();
    for (key, value) in kv.prefix_scan(KeyPrefix::Count.as_bytes())? {
        let who = principal_suffix(KeyPrefix::Count, &key)?;
        let count: u64 = decode(&value, "message count")?;
        counts.insert(who, count);
    }

    let mut rates = Vec::new();
    for (key, value) in kv.prefix_scan(KeyPrefix::Rate.as_bytes())? {
        let who = principal_suffix(KeyPrefix::Rate, &key)?;
        let record: RateRecord = decode(&value, "rate record")?;
        rates.push((who, record));
    }

    let store = MessageStore::restore(policy, messages, replies, counts);
    let check = check_all_invariants(&store);
    if !check.is_ok() {
        return Err(corruption(format!("invariants violated: {:?}", check.violations)).into());
    }

    Ok(Some(MessageLedger::new(
        ServiceController::restore(state, initial_fee, initial_limits),
        RateLimiter::restore(rates),
        store,
    )))
}
