//! Value objects for the Anonymous Messaging subsystem.

use super::entities::{
    Lifecycle, Message, MessageId, Principal, RateRecord, DEFAULT_MAX_PER_WINDOW,
    DEFAULT_RATE_WINDOW,
};
use serde::{Deserialize, Serialize};

/// Owner-configurable rate-limit parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimits {
    /// Window length in time units.
    pub window: u64,
    /// Rate-limited sends admitted per identity per window.
    pub max_per_window: u64,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            window: DEFAULT_RATE_WINDOW,
            max_per_window: DEFAULT_MAX_PER_WINDOW,
        }
    }
}

/// Whether an admission path consults the rate limiter.
///
/// Plain and bulk sends are exempt; categorized sends and replies are not.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RatePolicy {
    /// Admission bypasses the rate limiter.
    Exempt,
    /// Admission must fit in the caller's current window.
    Enforced,
}

/// Caller-supplied fields of a message about to be admitted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NewMessage {
    pub content: String,
    pub category: Option<String>,
    pub encrypted: bool,
    pub reply_to: Option<MessageId>,
}

impl NewMessage {
    /// A plain top-level message.
    pub fn plain(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }
}

/// Every record a validated admission will write.
///
/// Produced by the pure `prepare_*` step and consumed by the infallible
/// `apply` step, so nothing is written unless every check passed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Admission {
    /// Messages to append, ids consecutive from the current `next_id`.
    pub messages: Vec<Message>,
    /// Parent id and its reply sequence after this admission.
    pub parent_replies: Option<(MessageId, Vec<MessageId>)>,
    /// Identity the messages are attributed to for abuse control.
    pub author: Principal,
    /// Author's lifetime message count after this admission.
    pub author_count: u64,
    /// Author's rate record after this admission, if rate-limited.
    pub rate: Option<RateRecord>,
}

impl Admission {
    /// Id of the first admitted message.
    pub fn first_id(&self) -> Option<MessageId> {
        self.messages.first().map(|m| m.id)
    }
}

/// Result of a bulk send.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkSendResult {
    pub first_id: MessageId,
    pub second_id: MessageId,
}

/// Snapshot of the service configuration and size, for operators.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub lifecycle: Lifecycle,
    pub owner: Principal,
    pub service_fee: u64,
    pub rate_limits: RateLimits,
    pub message_count: u64,
}
