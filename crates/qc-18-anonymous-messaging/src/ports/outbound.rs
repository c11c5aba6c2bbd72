//! # Outbound Ports (Driven Ports)
//!
//! Dependencies the Anonymous Messaging service requires from its host.

use crate::domain::entities::Timestamp;
use crate::domain::errors::KVStoreError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

/// Result of a prefix scan: `(key, value)` pairs.
pub type ScanResult = Vec<(Vec<u8>, Vec<u8>)>;

/// Abstract interface for key-value database operations.
///
/// Testing: `InMemoryKVStore` (adapters/memory.rs)
pub trait KeyValueStore: Send + Sync {
    /// Get a value by key.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError>;

    /// Put a single key-value pair.
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError>;

    /// Execute an atomic batch write.
    ///
    /// Either ALL operations in the batch succeed, or NONE are applied.
    /// Every admission and every configuration change is written as one batch.
    fn atomic_batch_write(&mut self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError>;

    /// Check if a key exists.
    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError>;

    /// Iterate over keys with a prefix.
    fn prefix_scan(&self, prefix: &[u8]) -> Result<ScanResult, KVStoreError>;
}

/// Batch operation for atomic writes.
///
/// The ledger never removes a record, so there is no delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOperation {
    Put { key: Vec<u8>, value: Vec<u8> },
}

impl BatchOperation {
    /// Create a Put operation.
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Key this operation touches.
    pub fn key(&self) -> &[u8] {
        match self {
            BatchOperation::Put { key, .. } => key,
        }
    }
}

/// Source of the ledger's monotonic time counter.
///
/// Rate windows and `created_at` are measured in whatever unit this
/// returns (block heights on-chain, seconds with `SystemTimeSource`).
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Default time source using system time, in seconds since epoch.
///
/// Never goes backwards: a reading below the last one returned, or a clock
/// set before the epoch, yields the last reading again.
#[derive(Debug, Default)]
pub struct SystemTimeSource {
    last: AtomicU64,
}

impl SystemTimeSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        let reading = match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(elapsed) => elapsed.as_secs(),
            Err(e) => {
                let last = self.last.load(Ordering::Acquire);
                warn!(error = %e, last, "[qc-18] System clock before epoch, holding last reading");
                last
            }
        };
        let previous = self.last.fetch_max(reading, Ordering::AcqRel);
        previous.max(reading)
    }
}
