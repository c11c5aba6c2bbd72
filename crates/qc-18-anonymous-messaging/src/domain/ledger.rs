//! # Message Ledger - Aggregate Root
//!
//! Composes the controller, the rate limiter and the message store into
//! the admission pipeline:
//!
//! ```text
//! lifecycle gate ──→ parent/depth ──→ content ──→ rate check ──→ Admission
//!                                                                   │
//!                                            apply (infallible) ←───┘
//! ```
//!
//! Nothing here performs I/O or locking; the service layer serializes
//! writers and persists each `Admission` before applying it.
//!
//! ## Rate-Limited Entry Points
//!
//! | Entry point | `RatePolicy` |
//! |-------------|--------------|
//! | `prepare_send` | Exempt |
//! | `prepare_send_with_category` | Enforced |
//! | `prepare_reply` | Enforced |
//! | `prepare_bulk` | Exempt |

use super::controller::ServiceController;
use super::entities::{MessageId, Principal, ServiceState, Timestamp};
use super::errors::AnonymityError;
use super::rate_limit::RateLimiter;
use super::store::MessageStore;
use super::value_objects::{Admission, NewMessage, RateLimits, RatePolicy, ServiceStatus};

/// The complete in-memory ledger state.
#[derive(Clone, Debug)]
pub struct MessageLedger {
    controller: ServiceController,
    limiter: RateLimiter,
    store: MessageStore,
}

impl MessageLedger {
    /// Assembles a ledger from its parts.
    pub fn new(controller: ServiceController, limiter: RateLimiter, store: MessageStore) -> Self {
        Self {
            controller,
            limiter,
            store,
        }
    }

    /// Service controller.
    pub fn controller(&self) -> &ServiceController {
        &self.controller
    }

    /// Rate limiter.
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Message store.
    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    // =========================================================================
    // MESSAGE ADMISSION
    // =========================================================================

    /// Plain anonymous send. Not rate-limited.
    pub fn prepare_send(
        &self,
        caller: &Principal,
        now: Timestamp,
        content: String,
    ) -> Result<Admission, AnonymityError> {
        self.prepare_message(caller, now, NewMessage::plain(content), RatePolicy::Exempt)
    }

    /// Send with optional category and encryption flag. Rate-limited.
    pub fn prepare_send_with_category(
        &self,
        caller: &Principal,
        now: Timestamp,
        content: String,
        category: Option<String>,
        encrypted: bool,
    ) -> Result<Admission, AnonymityError> {
        let new = NewMessage {
            content,
            category,
            encrypted,
            reply_to: None,
        };
        self.prepare_message(caller, now, new, RatePolicy::Enforced)
    }

    /// Reply to an existing message. Rate-limited.
    pub fn prepare_reply(
        &self,
        caller: &Principal,
        now: Timestamp,
        content: String,
        reply_to: MessageId,
        encrypted: bool,
    ) -> Result<Admission, AnonymityError> {
        let new = NewMessage {
            content,
            category: None,
            encrypted,
            reply_to: Some(reply_to),
        };
        self.prepare_message(caller, now, new, RatePolicy::Enforced)
    }

    /// Two top-level messages, admitted together or not at all. Not rate-limited.
    pub fn prepare_bulk(
        &self,
        caller: &Principal,
        now: Timestamp,
        first: &str,
        second: &str,
    ) -> Result<Admission, AnonymityError> {
        self.controller.require_active()?;
        self.store.prepare_bulk(first, second, caller, now)
    }

    fn prepare_message(
        &self,
        caller: &Principal,
        now: Timestamp,
        new: NewMessage,
        policy: RatePolicy,
    ) -> Result<Admission, AnonymityError> {
        self.controller.require_active()?;
        let mut admission = self.store.prepare_append(new, caller, now)?;
        if policy == RatePolicy::Enforced {
            let limits = self.controller.state().rate_limits;
            admission.rate = Some(self.limiter.check(caller, now, &limits)?);
        }
        Ok(admission)
    }

    /// Writes a prepared admission.
    pub fn apply_admission(&mut self, mut admission: Admission) {
        if let Some(record) = admission.rate.take() {
            self.limiter.commit(admission.author.clone(), record);
        }
        self.store.apply(admission);
        debug_assert!(
            super::invariants::check_all_invariants(&self.store).is_ok(),
            "store invariants violated after admission"
        );
    }

    // =========================================================================
    // ADMINISTRATION
    // =========================================================================

    /// See [`ServiceController::prepare_initialize`].
    pub fn prepare_initialize(&self, caller: &Principal) -> Result<ServiceState, AnonymityError> {
        self.controller.prepare_initialize(caller)
    }

    /// See [`ServiceController::prepare_pause`].
    pub fn prepare_pause(&self, caller: &Principal) -> Result<ServiceState, AnonymityError> {
        self.controller.prepare_pause(caller)
    }

    /// See [`ServiceController::prepare_resume`].
    pub fn prepare_resume(&self, caller: &Principal) -> Result<ServiceState, AnonymityError> {
        self.controller.prepare_resume(caller)
    }

    /// See [`ServiceController::prepare_service_fee`].
    pub fn prepare_service_fee(
        &self,
        caller: &Principal,
        fee: u64,
    ) -> Result<ServiceState, AnonymityError> {
        self.controller.prepare_service_fee(caller, fee)
    }

    /// See [`ServiceController::prepare_rate_limits`].
    pub fn prepare_rate_limits(
        &self,
        caller: &Principal,
        limits: RateLimits,
    ) -> Result<ServiceState, AnonymityError> {
        self.controller.prepare_rate_limits(caller, limits)
    }

    /// Installs a prepared service state.
    pub fn apply_state(&mut self, next: ServiceState) {
        self.controller.apply(next);
    }

    /// Operator snapshot.
    pub fn status(&self) -> ServiceStatus {
        let state = self.controller.state();
        ServiceStatus {
            lifecycle: state.lifecycle(),
            owner: state.owner.clone(),
            service_fee: state.service_fee,
            rate_limits: state.rate_limits,
            message_count: self.store.len(),
        }
    }
}
