//! # Domain Layer
//!
//! Pure domain logic for the Anonymous Messaging subsystem.
//! No I/O, no locking, no clocks: every time-dependent operation takes `now`.
//!
//! ## Modules
//!
//! - `entities` - Message, service state and rate record types
//! - `value_objects` - Rate limits, admissions and query snapshots
//! - `errors` - Domain error types with stable numeric codes
//! - `validation` - Content length policy
//! - `controller` - Owner gate and lifecycle transitions
//! - `rate_limit` - Per-identity windowed counter
//! - `store` - Append-only message arena and reply index
//! - `ledger` - Aggregate composing the three state holders
//! - `invariants` - Structural checks over the message table

pub mod controller;
pub mod entities;
pub mod errors;
pub mod invariants;
pub mod ledger;
pub mod rate_limit;
pub mod store;
pub mod validation;
pub mod value_objects;

pub use controller::ServiceController;
pub use entities::*;
pub use errors::{AnonymityError, KVStoreError};
pub use ledger::MessageLedger;
pub use rate_limit::RateLimiter;
pub use store::MessageStore;
pub use validation::{is_valid_content, ContentPolicy, MAX_CONTENT_LEN, MIN_CONTENT_LEN};
pub use value_objects::*;
