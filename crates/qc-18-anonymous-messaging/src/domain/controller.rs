//! # Service Controller
//!
//! Owner identity, lifecycle flags and fee/rate-limit configuration.
//!
//! Every transition is computed by a pure `prepare_*` method that returns
//! the next `ServiceState`; the caller persists it and then hands it to
//! `apply`. A failed check therefore never leaves a partial write.
//!
//! ## Authorization
//!
//! | Operation | Owner only | Requires initialized |
//! |-----------|------------|----------------------|
//! | `initialize` | yes | must NOT be initialized |
//! | `pause` / `resume` | yes | yes |
//! | `update_service_fee` | yes | no |
//! | `update_rate_limits` | yes | no |

use super::entities::{Principal, ServiceState};
use super::errors::AnonymityError;
use super::value_objects::RateLimits;

/// Lifecycle and configuration gate for all mutating operations.
#[derive(Clone, Debug)]
pub struct ServiceController {
    state: ServiceState,
    /// Fee installed by `initialize`.
    initial_fee: u64,
    /// Rate limits installed by `initialize`.
    initial_limits: RateLimits,
}

impl ServiceController {
    /// Creates the controller for a freshly deployed service.
    pub fn new(owner: Principal, initial_fee: u64, initial_limits: RateLimits) -> Self {
        let mut state = ServiceState::deployed(owner);
        state.service_fee = initial_fee;
        state.rate_limits = initial_limits;
        Self {
            state,
            initial_fee,
            initial_limits,
        }
    }

    /// Rebuilds the controller around a previously persisted state.
    pub fn restore(state: ServiceState, initial_fee: u64, initial_limits: RateLimits) -> Self {
        Self {
            state,
            initial_fee,
            initial_limits,
        }
    }

    /// Current state.
    pub fn state(&self) -> &ServiceState {
        &self.state
    }

    /// Service owner.
    pub fn owner(&self) -> &Principal {
        &self.state.owner
    }

    /// Fails with `OwnerOnly` unless `caller` is the owner.
    pub fn require_owner(&self, caller: &Principal) -> Result<(), AnonymityError> {
        if caller != &self.state.owner {
            return Err(AnonymityError::OwnerOnly {
                caller: caller.to_string(),
            });
        }
        Ok(())
    }

    /// Gate for message admission.
    ///
    /// Fails with `NotInitialized` when the service was never initialized
    /// OR is currently paused; callers cannot tell the two apart.
    pub fn require_active(&self) -> Result<(), AnonymityError> {
        if !self.state.is_active() {
            return Err(AnonymityError::NotInitialized);
        }
        Ok(())
    }

    /// Computes the state after `initialize`.
    ///
    /// # Errors
    /// - `OwnerOnly` if caller is not the deploying identity
    /// - `AlreadyInitialized` on every call after the first success
    pub fn prepare_initialize(&self, caller: &Principal) -> Result<ServiceState, AnonymityError> {
        self.require_owner(caller)?;
        if self.state.initialized {
            return Err(AnonymityError::AlreadyInitialized);
        }
        Ok(ServiceState {
            initialized: true,
            paused: false,
            service_fee: self.initial_fee,
            rate_limits: self.initial_limits,
            ..self.state.clone()
        })
    }

    /// Computes the state after `pause-service`. Redundant pauses succeed.
    pub fn prepare_pause(&self, caller: &Principal) -> Result<ServiceState, AnonymityError> {
        self.prepare_paused_flag(caller, true)
    }

    /// Computes the state after `resume-service`. Redundant resumes succeed.
    pub fn prepare_resume(&self, caller: &Principal) -> Result<ServiceState, AnonymityError> {
        self.prepare_paused_flag(caller, false)
    }

    fn prepare_paused_flag(
        &self,
        caller: &Principal,
        paused: bool,
    ) -> Result<ServiceState, AnonymityError> {
        self.require_owner(caller)?;
        if !self.state.initialized {
            return Err(AnonymityError::NotInitialized);
        }
        Ok(ServiceState {
            paused,
            ..self.state.clone()
        })
    }

    /// Computes the state after `update-service-fee`.
    pub fn prepare_service_fee(
        &self,
        caller: &Principal,
        fee: u64,
    ) -> Result<ServiceState, AnonymityError> {
        self.require_owner(caller)?;
        Ok(ServiceState {
            service_fee: fee,
            ..self.state.clone()
        })
    }

    /// Computes the state after `update-rate-limits`.
    ///
    /// Existing rate records are re-evaluated against the new limits on
    /// their owner's next send; nothing is invalidated retroactively.
    pub fn prepare_rate_limits(
        &self,
        caller: &Principal,
        limits: RateLimits,
    ) -> Result<ServiceState, AnonymityError> {
        self.require_owner(caller)?;
        Ok(ServiceState {
            rate_limits: limits,
            ..self.state.clone()
        })
    }

    /// Installs a state produced by one of the `prepare_*` methods.
    pub fn apply(&mut self, next: ServiceState) {
        debug_assert_eq!(next.owner, self.state.owner, "owner is immutable");
        self.state = next;
    }
}
