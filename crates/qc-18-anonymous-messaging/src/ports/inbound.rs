//! # Inbound Port - AnonymityServiceApi
//!
//! Primary driving port exposing the anonymous message ledger.
//!
//! ## Authorization
//!
//! | Method | Authorized Caller |
//! |--------|-------------------|
//! | `initialize`, `pause_service`, `resume_service` | Owner |
//! | `update_service_fee`, `update_rate_limits` | Owner |
//! | message admission | Any identity, service active |
//! | queries | Anyone |
//!
//! Every mutating method receives the authenticated caller identity
//! explicitly; the service never infers it.

use crate::domain::{
    AnonymityError, BulkSendResult, Message, MessageId, Principal, RateLimits, RateRecord,
    ServiceStatus,
};

/// Primary API for the Anonymous Messaging subsystem.
///
/// # Example
///
/// ```rust,ignore
/// use qc_18_anonymous_messaging::ports::AnonymityServiceApi;
///
/// fn example(service: &impl AnonymityServiceApi, owner: &Principal, user: &Principal) {
///     service.initialize(owner)?;
///     let root = service.send_anonymous_message(user, "Hello from nowhere".into())?;
///     service.reply_to_message(user, "And a reply to it".into(), root, false)?;
///     assert_eq!(service.get_message_replies(root), Some(vec![1]));
/// }
/// ```
pub trait AnonymityServiceApi: Send + Sync {
    // =========================================================================
    // ADMINISTRATION
    // =========================================================================

    /// Activates the service exactly once.
    ///
    /// # Errors
    /// - `OwnerOnly`: caller is not the owner
    /// - `AlreadyInitialized`: any call after the first success
    fn initialize(&self, caller: &Principal) -> Result<(), AnonymityError>;

    /// Stops message admission. Redundant pauses succeed.
    ///
    /// # Errors
    /// - `OwnerOnly`, then `NotInitialized`
    fn pause_service(&self, caller: &Principal) -> Result<(), AnonymityError>;

    /// Restarts message admission. Redundant resumes succeed.
    ///
    /// # Errors
    /// - `OwnerOnly`, then `NotInitialized`
    fn resume_service(&self, caller: &Principal) -> Result<(), AnonymityError>;

    /// Records a new informational fee.
    fn update_service_fee(&self, caller: &Principal, fee: u64) -> Result<(), AnonymityError>;

    /// Replaces the rate-limit window and per-window capacity.
    fn update_rate_limits(
        &self,
        caller: &Principal,
        window: u64,
        max_per_window: u64,
    ) -> Result<(), AnonymityError>;

    // =========================================================================
    // MESSAGE ADMISSION
    // =========================================================================

    /// Stores a top-level message. Not rate-limited.
    ///
    /// # Errors
    /// - `NotInitialized`: service uninitialized or paused
    /// - `InvalidMessageLength`: content outside the length bounds
    fn send_anonymous_message(
        &self,
        caller: &Principal,
        content: String,
    ) -> Result<MessageId, AnonymityError>;

    /// Stores a top-level message with category and encryption flag.
    ///
    /// # Errors
    /// - `NotInitialized`, `InvalidMessageLength`
    /// - `RateLimitExceeded`: caller's window is full
    fn send_anonymous_message_with_category(
        &self,
        caller: &Principal,
        content: String,
        category: Option<String>,
        encrypted: bool,
    ) -> Result<MessageId, AnonymityError>;

    /// Stores a reply to an existing message.
    ///
    /// # Errors
    /// - `NotInitialized`
    /// - `MessageNotFound`: `reply_to` does not exist
    /// - `InvalidReplyDepth`: parent is already at the maximum depth
    /// - `InvalidMessageLength`, `RateLimitExceeded`
    fn reply_to_message(
        &self,
        caller: &Principal,
        content: String,
        reply_to: MessageId,
        encrypted: bool,
    ) -> Result<MessageId, AnonymityError>;

    /// Stores two top-level messages atomically. Not rate-limited.
    fn send_bulk_messages(
        &self,
        caller: &Principal,
        first: String,
        second: String,
    ) -> Result<BulkSendResult, AnonymityError>;

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Full message record.
    fn get_message(&self, id: MessageId) -> Option<Message>;

    /// Total messages ever created.
    fn get_message_count(&self) -> u64;

    /// `to - from` for a valid end-exclusive range.
    ///
    /// # Errors
    /// - `InvalidRange`: `from > to` or `to >= get_message_count()`
    fn get_messages_count(&self, from: MessageId, to: MessageId) -> Result<u64, AnonymityError>;

    /// Id of the most recent message.
    ///
    /// # Errors
    /// - `NoMessages`: nothing stored yet
    fn get_last_message_id(&self) -> Result<MessageId, AnonymityError>;

    fn does_message_exist(&self, id: MessageId) -> bool;

    /// Reply depth of an existing message.
    fn get_message_depth(&self, id: MessageId) -> Option<u32>;

    /// Direct replies, oldest first. `Some(vec![])` for a message without replies.
    fn get_message_replies(&self, id: MessageId) -> Option<Vec<MessageId>>;

    /// Lifetime number of messages attributed to `who`.
    fn get_user_message_count(&self, who: &Principal) -> u64;

    fn get_service_fee(&self) -> u64;

    /// Content length check with the configured bounds.
    fn is_valid_content(&self, text: &str) -> bool;

    /// Lifecycle, configuration and size in one consistent snapshot.
    fn get_service_status(&self) -> ServiceStatus;

    fn get_rate_limits(&self) -> RateLimits;

    fn get_owner(&self) -> Principal;

    /// Current rate record of `who`, if a rate-limited send was ever admitted.
    fn get_rate_record(&self, who: &Principal) -> Option<RateRecord>;
}
