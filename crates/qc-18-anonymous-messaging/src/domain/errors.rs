//! Anonymous messaging error types.
//!
//! Every failure is an expected outcome of authorization or input
//! validation and is reported to the caller verbatim. Each variant carries
//! a stable numeric code that transports surface unchanged.

use super::entities::MessageId;
use thiserror::Error;

/// Domain error for all service operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnonymityError {
    /// Caller is not the service owner.
    #[error("owner only: caller {caller} is not the service owner")]
    OwnerOnly { caller: String },

    /// `initialize` was already called successfully.
    #[error("service already initialized")]
    AlreadyInitialized,

    /// Service is not initialized, or is currently paused.
    #[error("service not initialized or paused")]
    NotInitialized,

    /// Content length is outside the allowed bounds.
    #[error("invalid message length: {length} chars (allowed {min}..={max})")]
    InvalidMessageLength { length: usize, min: usize, max: usize },

    /// Reply target does not exist.
    #[error("message not found: {0}")]
    MessageNotFound(MessageId),

    /// Range query bounds are inverted or exceed the known message count.
    #[error("invalid range: from {from} to {to} (message count {count})")]
    InvalidRange { from: u64, to: u64, count: u64 },

    /// No message has been created yet.
    #[error("no messages stored")]
    NoMessages,

    /// Resulting reply depth would exceed the maximum.
    #[error("invalid reply depth: {depth} exceeds maximum {max}")]
    InvalidReplyDepth { depth: u32, max: u32 },

    /// Caller has used up the current rate window.
    #[error("rate limit exceeded: {count}/{max} messages in current window")]
    RateLimitExceeded { count: u64, max: u64 },

    /// Persistence collaborator failed; nothing was committed.
    #[error("storage error: {0}")]
    Storage(String),
}

impl AnonymityError {
    /// Stable numeric code for this error kind.
    #[must_use]
    pub fn code(&self) -> u32 {
        match self {
            Self::OwnerOnly { .. } => 100,
            Self::AlreadyInitialized => 101,
            Self::NotInitialized => 102,
            Self::InvalidMessageLength { .. } => 103,
            Self::MessageNotFound(_) => 104,
            Self::InvalidRange { .. } => 105,
            Self::NoMessages => 106,
            Self::InvalidReplyDepth { .. } => 107,
            Self::RateLimitExceeded { .. } => 109,
            Self::Storage(_) => 500,
        }
    }
}

/// Key-value store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KVStoreError {
    /// I/O error during read/write.
    #[error("KV store I/O error: {message}")]
    IOError { message: String },

    /// Stored bytes could not be decoded or violate ledger invariants.
    #[error("KV store corruption: {message}")]
    CorruptionError { message: String },
}

impl From<KVStoreError> for AnonymityError {
    fn from(err: KVStoreError) -> Self {
        AnonymityError::Storage(err.to_string())
    }
}
