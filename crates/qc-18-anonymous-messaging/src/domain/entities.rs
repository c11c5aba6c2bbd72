//! Core domain entities for the Anonymous Messaging subsystem.
//!
//! Defines the message record, the singleton service state and the
//! per-identity rate record.

use super::value_objects::RateLimits;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sequential message identifier, starting at 0.
pub type MessageId = u64;

/// Opaque, monotonically non-decreasing time unit (block height on a ledger).
pub type Timestamp = u64;

/// Maximum distance (in reply edges) from a message to its top-level ancestor.
pub const MAX_REPLY_DEPTH: u32 = 5;

/// Default service fee set by `initialize`.
pub const DEFAULT_SERVICE_FEE: u64 = 100;

/// Default rate window length in time units.
pub const DEFAULT_RATE_WINDOW: u64 = 144;

/// Default number of rate-limited sends admitted per window.
pub const DEFAULT_MAX_PER_WINDOW: u64 = 10;

/// Caller identity as supplied by the identity resolver.
///
/// The core trusts it absolutely for owner checks and rate-limit keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Principal(String);

impl Principal {
    /// Wraps a resolved identity.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Principal {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A stored message. Immutable once created.
///
/// INVARIANT-2: `reply_depth == parent.reply_depth + 1`, or 0 for top-level.
/// INVARIANT-3: `reply_to` always names a message created earlier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Sequential identifier.
    pub id: MessageId,
    /// Length-validated text.
    pub content: String,
    /// Attributable sender. Always `None` for anonymous sends.
    pub sender: Option<Principal>,
    /// Optional caller-supplied category.
    pub category: Option<String>,
    /// Caller-asserted encryption flag; opaque to the store.
    pub encrypted: bool,
    /// Parent message for replies.
    pub reply_to: Option<MessageId>,
    /// Distance from the top-level ancestor.
    pub reply_depth: u32,
    /// Clock value at admission.
    pub created_at: Timestamp,
}

/// Lifecycle derived from the `initialized`/`paused` flags.
///
/// ```text
/// [UNINITIALIZED] ──initialize──→ [ACTIVE] ──pause──→ [PAUSED]
///                                     ↑                  │
///                                     └──────resume──────┘
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lifecycle {
    /// `initialize` has not succeeded yet.
    Uninitialized,
    /// Accepting messages.
    Active,
    /// Initialized but rejecting messages.
    Paused,
}

/// Process-wide service state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceState {
    /// Deploying identity; immutable.
    pub owner: Principal,
    /// Set exactly once by `initialize`.
    pub initialized: bool,
    /// Toggled by pause/resume.
    pub paused: bool,
    /// Owner-configurable price parameter. Stored, not enforced.
    pub service_fee: u64,
    /// Current rate-limit configuration.
    pub rate_limits: RateLimits,
}

impl ServiceState {
    /// Creates the pre-initialization state for a freshly deployed service.
    pub fn deployed(owner: Principal) -> Self {
        Self {
            owner,
            initialized: false,
            paused: false,
            service_fee: DEFAULT_SERVICE_FEE,
            rate_limits: RateLimits::default(),
        }
    }

    /// Returns the lifecycle state.
    pub fn lifecycle(&self) -> Lifecycle {
        match (self.initialized, self.paused) {
            (false, _) => Lifecycle::Uninitialized,
            (true, false) => Lifecycle::Active,
            (true, true) => Lifecycle::Paused,
        }
    }

    /// Returns true if message admission is open.
    pub fn is_active(&self) -> bool {
        self.initialized && !self.paused
    }
}

/// Per-identity sliding-window counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateRecord {
    /// Start of the current window.
    pub window_start: Timestamp,
    /// Rate-limited sends admitted in the current window.
    pub count_in_window: u64,
}

impl RateRecord {
    /// A fresh, empty window starting at `now`.
    pub fn fresh(now: Timestamp) -> Self {
        Self {
            window_start: now,
            count_in_window: 0,
        }
    }

    /// Returns true if the window starting at `window_start` has elapsed.
    pub fn is_expired(&self, now: Timestamp, window: u64) -> bool {
        now.saturating_sub(self.window_start) >= window
    }
}
