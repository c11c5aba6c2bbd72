//! # Anonymous Messaging Service
//!
//! Wires the pure `MessageLedger` to its driven ports and implements
//! [`AnonymityServiceApi`].
//!
//! ## Write Path
//!
//! ```text
//! write lock ──→ prepare (pure) ──→ KeyValueStore::atomic_batch_write ──→ apply
//!                    │ Err                     │ Err
//!                    └──→ rejected             └──→ Storage error, nothing applied
//! ```
//!
//! All mutations hold the write lock for the whole cycle, so admissions are
//! linearized and ids are assigned in commit order. Queries take the read
//! lock and observe a consistent snapshot.
//!
//! ## Logging
//!
//! Message content is never logged, only its length.

use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::adapters::codec::{self, KeyPrefix};
use crate::config::{ConfigError, ServiceConfig};
use crate::domain::invariants::{check_all_invariants, InvariantCheckResult};
use crate::domain::{
    AnonymityError, BulkSendResult, Message, MessageId, MessageLedger, MessageStore, Principal,
    RateLimiter, RateLimits, RateRecord, ServiceController, ServiceState, ServiceStatus,
};
use crate::domain::value_objects::Admission;
use crate::ports::inbound::AnonymityServiceApi;
use crate::ports::outbound::{KeyValueStore, TimeSource};

/// Failure to construct a service.
#[derive(Debug, Error)]
pub enum OpenError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to restore ledger: {0}")]
    Ledger(#[from] AnonymityError),

    #[error("store already holds a ledger; use open to restore it")]
    AlreadyDeployed,
}

struct Inner<K> {
    ledger: MessageLedger,
    kv: K,
}

/// Anonymous Messaging Service.
///
/// ## Thread Safety
///
/// `Send + Sync`; share it across threads via `Arc`.
///
/// ## Dependencies
///
/// - `T: TimeSource` - time counter for `created_at` and rate windows
/// - `K: KeyValueStore` - write-through persistence
pub struct AnonymityService<T, K>
where
    T: TimeSource,
    K: KeyValueStore,
{
    config: ServiceConfig,
    clock: T,
    inner: RwLock<Inner<K>>,
}

impl<T, K> AnonymityService<T, K>
where
    T: TimeSource,
    K: KeyValueStore,
{
    /// Deploys a fresh, uninitialized service.
    ///
    /// Nothing is written to `kv` until the first state change. Fails with
    /// [`OpenError::AlreadyDeployed`] if `kv` already holds service state,
    /// since starting over would reuse persisted ids.
    pub fn new(config: ServiceConfig, clock: T, kv: K) -> Result<Self, OpenError> {
        config.validate()?;
        if kv
            .exists(&KeyPrefix::state_key())
            .map_err(AnonymityError::from)?
        {
            warn!("[qc-18] Refusing to deploy over a persisted ledger");
            return Err(OpenError::AlreadyDeployed);
        }
        let ledger = Self::fresh_ledger(&config);
        info!(owner = %config.owner, "[qc-18] Anonymous messaging service deployed");
        Ok(Self {
            config,
            clock,
            inner: RwLock::new(Inner { ledger, kv }),
        })
    }

    /// Restores a previously persisted ledger from `kv`, or deploys a fresh
    /// one when `kv` holds no service state.
    ///
    /// The persisted owner wins over `config.owner`.
    pub fn open(config: ServiceConfig, clock: T, kv: K) -> Result<Self, OpenError> {
        config.validate()?;
        let restored = codec::load_ledger(
            &kv,
            config.content_policy(),
            config.default_service_fee,
            config.rate_limits(),
        )
        .map_err(|e| {
            error!(error = %e, "[qc-18] Failed to restore ledger");
            e
        })?;

        let ledger = match restored {
            Some(ledger) => {
                if ledger.controller().owner() != &config.owner {
                    warn!(
                        persisted = %ledger.controller().owner(),
                        configured = %config.owner,
                        "[qc-18] Configured owner ignored, keeping persisted owner"
                    );
                }
                info!(
                    messages = ledger.store().len(),
                    rate_records = ledger.limiter().len(),
                    "[qc-18] Ledger restored from storage"
                );
                ledger
            }
            None => {
                info!(owner = %config.owner, "[qc-18] No persisted ledger, starting fresh");
                Self::fresh_ledger(&config)
            }
        };

        Ok(Self {
            config,
            clock,
            inner: RwLock::new(Inner { ledger, kv }),
        })
    }

    fn fresh_ledger(config: &ServiceConfig) -> MessageLedger {
        MessageLedger::new(
            ServiceController::new(
                config.owner.clone(),
                config.default_service_fee,
                config.rate_limits(),
            ),
            RateLimiter::new(),
            MessageStore::new(config.content_policy()),
        )
    }

    /// Active configuration.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Runs `f` against the backing store under the read lock.
    ///
    /// Requires feature: `test-utils`
    #[cfg(any(test, feature = "test-utils"))]
    pub fn with_store<R>(&self, f: impl FnOnce(&K) -> R) -> R {
        f(&self.inner.read().kv)
    }

    /// Runs the store invariant checks against the current snapshot.
    pub fn check_invariants(&self) -> InvariantCheckResult {
        check_all_invariants(self.inner.read().ledger.store())
    }

    // =========================================================================
    // COMMIT HELPERS
    // =========================================================================

    fn commit_state<F>(&self, operation: &'static str, prepare: F) -> Result<(), AnonymityError>
    where
        F: FnOnce(&MessageLedger) -> Result<ServiceState, AnonymityError>,
    {
        let mut guard = self.inner.write();
        let Inner { ledger, kv } = &mut *guard;

        let next = prepare(&*ledger).map_err(|e| log_rejection(operation, e))?;
        persist(kv, codec::state_batch(&next)?, operation)?;
        ledger.apply_state(next);
        Ok(())
    }

    fn commit_admission<F>(
        &self,
        operation: &'static str,
        prepare: F,
    ) -> Result<Vec<MessageId>, AnonymityError>
    where
        F: FnOnce(&MessageLedger, u64) -> Result<Admission, AnonymityError>,
    {
        let mut guard = self.inner.write();
        let Inner { ledger, kv } = &mut *guard;

        // Read under the write lock so created_at never decreases with id
        let now = self.clock.now();
        let admission = prepare(&*ledger, now).map_err(|e| log_rejection(operation, e))?;
        persist(kv, codec::admission_batch(&admission)?, operation)?;

        let ids: Vec<MessageId> = admission.messages.iter().map(|m| m.id).collect();
        let depth = admission.messages.first().map_or(0, |m| m.reply_depth);
        let rate_count = admission.rate.map(|r| r.count_in_window);
        let author = admission.author.clone();
        ledger.apply_admission(admission);

        info!(
            operation,
            ?ids,
            depth,
            author = %author,
            ?rate_count,
            "[qc-18] Message admitted"
        );
        Ok(ids)
    }
}

fn persist<K: KeyValueStore>(
    kv: &mut K,
    ops: Vec<crate::ports::outbound::BatchOperation>,
    operation: &'static str,
) -> Result<(), AnonymityError> {
    kv.atomic_batch_write(ops).map_err(|e| {
        error!(operation, error = %e, "[qc-18] Persistence failed, nothing applied");
        AnonymityError::from(e)
    })
}

fn log_rejection(operation: &'static str, err: AnonymityError) -> AnonymityError {
    match &err {
        AnonymityError::InvalidMessageLength { .. }
        | AnonymityError::MessageNotFound(_)
        | AnonymityError::InvalidReplyDepth { .. } => {
            debug!(operation, code = err.code(), error = %err, "[qc-18] Rejected invalid input");
        }
        _ => {
            warn!(operation, code = err.code(), error = %err, "[qc-18] Operation rejected");
        }
    }
    err
}

fn single(ids: Vec<MessageId>) -> Result<MessageId, AnonymityError> {
    ids.first()
        .copied()
        .ok_or_else(|| AnonymityError::Storage("admission produced no message".to_string()))
}

impl<T, K> AnonymityServiceApi for AnonymityService<T, K>
where
    T: TimeSource,
    K: KeyValueStore,
{
    #[instrument(skip(self), fields(caller = %caller))]
    fn initialize(&self, caller: &Principal) -> Result<(), AnonymityError> {
        self.commit_state("initialize", |l| l.prepare_initialize(caller))?;
        info!("[qc-18] Service initialized");
        Ok(())
    }

    #[instrument(skip(self), fields(caller = %caller))]
    fn pause_service(&self, caller: &Principal) -> Result<(), AnonymityError> {
        self.commit_state("pause_service", |l| l.prepare_pause(caller))?;
        info!("[qc-18] Service paused");
        Ok(())
    }

    #[instrument(skip(self), fields(caller = %caller))]
    fn resume_service(&self, caller: &Principal) -> Result<(), AnonymityError> {
        self.commit_state("resume_service", |l| l.prepare_resume(caller))?;
        info!("[qc-18] Service resumed");
        Ok(())
    }

    #[instrument(skip(self), fields(caller = %caller))]
    fn update_service_fee(&self, caller: &Principal, fee: u64) -> Result<(), AnonymityError> {
        self.commit_state("update_service_fee", |l| l.prepare_service_fee(caller, fee))?;
        info!(fee, "[qc-18] Service fee updated");
        Ok(())
    }

    #[instrument(skip(self), fields(caller = %caller))]
    fn update_rate_limits(
        &self,
        caller: &Principal,
        window: u64,
        max_per_window: u64,
    ) -> Result<(), AnonymityError> {
        let limits = RateLimits {
            window,
            max_per_window,
        };
        self.commit_state("update_rate_limits", |l| {
            l.prepare_rate_limits(caller, limits)
        })?;
        info!(window, max_per_window, "[qc-18] Rate limits updated");
        Ok(())
    }

    #[instrument(skip(self, content), fields(caller = %caller, len = content.chars().count()))]
    fn send_anonymous_message(
        &self,
        caller: &Principal,
        content: String,
    ) -> Result<MessageId, AnonymityError> {
        let ids = self.commit_admission("send_anonymous_message", |l, now| {
            l.prepare_send(caller, now, content)
        })?;
        single(ids)
    }

    #[instrument(skip(self, content, category), fields(caller = %caller, len = content.chars().count()))]
    fn send_anonymous_message_with_category(
        &self,
        caller: &Principal,
        content: String,
        category: Option<String>,
        encrypted: bool,
    ) -> Result<MessageId, AnonymityError> {
        let ids = self.commit_admission("send_anonymous_message_with_category", |l, now| {
            l.prepare_send_with_category(caller, now, content, category, encrypted)
        })?;
        single(ids)
    }

    #[instrument(skip(self, content), fields(caller = %caller, len = content.chars().count()))]
    fn reply_to_message(
        &self,
        caller: &Principal,
        content: String,
        reply_to: MessageId,
        encrypted: bool,
    ) -> Result<MessageId, AnonymityError> {
        let ids = self.commit_admission("reply_to_message", |l, now| {
            l.prepare_reply(caller, now, content, reply_to, encrypted)
        })?;
        single(ids)
    }

    #[instrument(skip(self, first, second), fields(caller = %caller))]
    fn send_bulk_messages(
        &self,
        caller: &Principal,
        first: String,
        second: String,
    ) -> Result<BulkSendResult, AnonymityError> {
        let ids = self.commit_admission("send_bulk_messages", |l, now| {
            l.prepare_bulk(caller, now, &first, &second)
        })?;
        match ids.as_slice() {
            [first_id, second_id] => Ok(BulkSendResult {
                first_id: *first_id,
                second_id: *second_id,
            }),
            _ => Err(AnonymityError::Storage(
                "bulk admission did not produce two messages".to_string(),
            )),
        }
    }

    fn get_message(&self, id: MessageId) -> Option<Message> {
        self.inner.read().ledger.store().get(id).cloned()
    }

    fn get_message_count(&self) -> u64 {
        self.inner.read().ledger.store().len()
    }

    fn get_messages_count(&self, from: MessageId, to: MessageId) -> Result<u64, AnonymityError> {
        self.inner.read().ledger.store().count_range(from, to)
    }

    fn get_last_message_id(&self) -> Result<MessageId, AnonymityError> {
        self.inner.read().ledger.store().last_id()
    }

    fn does_message_exist(&self, id: MessageId) -> bool {
        self.inner.read().ledger.store().contains(id)
    }

    fn get_message_depth(&self, id: MessageId) -> Option<u32> {
        self.inner.read().ledger.store().depth(id)
    }

    fn get_message_replies(&self, id: MessageId) -> Option<Vec<MessageId>> {
        self.inner.read().ledger.store().replies(id).map(<[_]>::to_vec)
    }

    fn get_user_message_count(&self, who: &Principal) -> u64 {
        self.inner.read().ledger.store().user_count(who)
    }

    fn get_service_fee(&self) -> u64 {
        self.inner.read().ledger.controller().state().service_fee
    }

    fn is_valid_content(&self, text: &str) -> bool {
        self.config.content_policy().is_valid(text)
    }

    fn get_service_status(&self) -> ServiceStatus {
        self.inner.read().ledger.status()
    }

    fn get_rate_limits(&self) -> RateLimits {
        self.inner.read().ledger.controller().state().rate_limits
    }

    fn get_owner(&self) -> Principal {
        self.inner.read().ledger.controller().owner().clone()
    }

    fn get_rate_record(&self, who: &Principal) -> Option<RateRecord> {
        self.inner.read().ledger.limiter().get(who).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryKVStore, ManualClock};
    use crate::domain::entities::Lifecycle;

    const TEXT: &str = "This is a test anonymous message";

    fn owner() -> Principal {
        Principal::from("deployer")
    }

    fn user() -> Principal {
        Principal::from("wallet_1")
    }

    fn service() -> AnonymityService<ManualClock, InMemoryKVStore> {
        let service = AnonymityService::new(
            ServiceConfig::new(owner()),
            ManualClock::new(1),
            InMemoryKVStore::new(),
        )
        .unwrap();
        service.initialize(&owner()).unwrap();
        service
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = ServiceConfig::new(owner());
        config.min_content_len = 0;
        let result = AnonymityService::new(config, ManualClock::new(0), InMemoryKVStore::new());
        assert!(result.is_err());
    }

    #[test]
    fn test_storage_failure_applies_nothing() {
        let service = service();
        service.send_anonymous_message(&user(), TEXT.into()).unwrap();

        service.inner.write().kv.set_fail_writes(true);

        assert!(matches!(
            service.send_anonymous_message(&user(), TEXT.into()),
            Err(AnonymityError::Storage(_))
        ));
        assert!(matches!(
            service.pause_service(&owner()),
            Err(AnonymityError::Storage(_))
        ));
        assert_eq!(service.get_message_count(), 1);
        assert_eq!(service.get_user_message_count(&user()), 1);
        assert_eq!(service.get_service_status().lifecycle, Lifecycle::Active);

        service.inner.write().kv.set_fail_writes(false);
        assert_eq!(service.send_anonymous_message(&user(), TEXT.into()), Ok(1));
    }

    #[test]
    fn test_created_at_follows_clock() {
        let clock = ManualClock::new(7);
        let service =
            AnonymityService::new(ServiceConfig::new(owner()), clock.clone(), InMemoryKVStore::new())
                .unwrap();
        service.initialize(&owner()).unwrap();

        let first = service.send_anonymous_message(&user(), TEXT.into()).unwrap();
        clock.advance(3);
        let second = service.send_anonymous_message(&user(), TEXT.into()).unwrap();

        assert_eq!(service.get_message(first).unwrap().created_at, 7);
        assert_eq!(service.get_message(second).unwrap().created_at, 10);
    }

    #[test]
    fn test_configured_bounds_drive_validation() {
        let mut config = ServiceConfig::new(owner());
        config.min_content_len = 3;
        config.max_content_len = 5;
        let service = AnonymityService::new(config, ManualClock::new(0), InMemoryKVStore::new())
            .unwrap();
        service.initialize(&owner()).unwrap();

        assert!(service.is_valid_content("abc"));
        assert!(!service.is_valid_content("abcdef"));
        assert_eq!(service.send_anonymous_message(&user(), "abcd".into()), Ok(0));
        assert!(matches!(
            service.send_anonymous_message(&user(), "ab".into()),
            Err(AnonymityError::InvalidMessageLength { length: 2, min: 3, max: 5 })
        ));
    }

    #[test]
    fn test_open_restores_persisted_ledger() {
        let service = service();
        service.send_anonymous_message(&user(), TEXT.into()).unwrap();
        service
            .send_anonymous_message_with_category(&user(), TEXT.into(), Some("news".into()), true)
            .unwrap();
        service.update_service_fee(&owner(), 42).unwrap();

        let kv = service.inner.read().kv.clone();
        let reopened = AnonymityService::open(
            ServiceConfig::new(Principal::from("someone_else")),
            ManualClock::new(100),
            kv,
        )
        .unwrap();

        assert_eq!(reopened.get_owner(), owner());
        assert_eq!(reopened.get_message_count(), 2);
        assert_eq!(reopened.get_service_fee(), 42);
        assert_eq!(reopened.get_rate_record(&user()).unwrap().count_in_window, 1);
        assert_eq!(
            reopened.get_message(1).unwrap().category.as_deref(),
            Some("news")
        );
        assert_eq!(reopened.send_anonymous_message(&user(), TEXT.into()), Ok(2));
    }

    #[test]
    fn test_new_refuses_persisted_ledger() {
        let service = service();
        for _ in 0..3 {
            service.send_anonymous_message(&user(), TEXT.into()).unwrap();
        }
        let kv = service.inner.read().kv.clone();

        let redeployed =
            AnonymityService::new(ServiceConfig::new(owner()), ManualClock::new(5), kv.clone());
        assert!(matches!(redeployed, Err(OpenError::AlreadyDeployed)));

        // The persisted records are untouched and still restorable
        let reopened =
            AnonymityService::open(ServiceConfig::new(owner()), ManualClock::new(5), kv).unwrap();
        assert_eq!(reopened.get_message_count(), 3);
        assert_eq!(
            reopened.initialize(&owner()),
            Err(AnonymityError::AlreadyInitialized)
        );
        assert_eq!(reopened.send_anonymous_message(&user(), TEXT.into()), Ok(3));
    }

    #[test]
    fn test_open_empty_store_is_fresh() {
        let service = AnonymityService::open(
            ServiceConfig::new(owner()),
            ManualClock::new(0),
            InMemoryKVStore::new(),
        )
        .unwrap();
        assert_eq!(
            service.get_service_status().lifecycle,
            Lifecycle::Uninitialized
        );
        assert!(service.check_invariants().is_ok());
    }
}
