//! # Anonymous Messaging Subsystem
//!
//! **Subsystem ID:** 18
//! **Status:** Production-Ready
//!
//! ## Purpose
//!
//! An append-only, owner-administered ledger of anonymous messages with
//! threaded replies, per-identity rate limiting and a read-only query
//! surface. Stored records never carry the author; the caller identity is
//! used only for owner checks, rate limiting and lifetime counters.
//!
//! ## Domain Invariants
//!
//! | ID | Invariant | Enforcement Location |
//! |----|-----------|---------------------|
//! | INVARIANT-1 | Dense ids `[0, next_id)` | `domain/store.rs` - `apply()` appends only |
//! | INVARIANT-2 | `reply_depth == parent.reply_depth + 1`, at most 5 | `domain/store.rs` - `prepare_append()` |
//! | INVARIANT-3 | Replies reference an existing, earlier message | `domain/store.rs` - parent lookup |
//! | INVARIANT-4 | At most `max_per_window` rate-limited sends per window | `domain/rate_limit.rs` - `check()` |
//! | INVARIANT-5 | No admission unless initialized and not paused | `domain/controller.rs` - `require_active()` |
//!
//! Invariants 1-3 are re-checked by `domain/invariants.rs` after every
//! admission in debug builds and on every restore from storage.
//!
//! ## Admission Pipeline
//!
//! ```text
//! [caller] ──→ gate ──→ parent/depth ──→ content ──→ rate ──→ persist ──→ apply
//!               │           │               │          │          │
//!               └───────────┴───────────────┴──────────┴──────────┴──→ Err, nothing written
//! ```
//!
//! | Operation | Rate-limited |
//! |-----------|--------------|
//! | `send_anonymous_message` | no |
//! | `send_anonymous_message_with_category` | yes |
//! | `reply_to_message` | yes |
//! | `send_bulk_messages` | no |
//!
//! ## Module Structure (Hexagonal Architecture)
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      OUTER LAYER                                │
//! │  adapters/ - in-memory KV store, manual clock, bincode codec    │
//! │  service.rs - AnonymityService (RwLock + write-through)         │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ implements ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      MIDDLE LAYER                               │
//! │  ports/inbound.rs  - AnonymityServiceApi trait                  │
//! │  ports/outbound.rs - KeyValueStore, TimeSource traits           │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ uses ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      INNER LAYER                                │
//! │  domain/controller.rs - owner gate and lifecycle                │
//! │  domain/rate_limit.rs - windowed per-identity counter           │
//! │  domain/store.rs      - message arena and reply index           │
//! │  domain/ledger.rs     - aggregate admission pipeline            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use qc_18_anonymous_messaging::prelude::*;
//!
//! let owner = Principal::from("deployer");
//! let service = AnonymityService::new(
//!     ServiceConfig::new(owner.clone()),
//!     SystemTimeSource::new(),
//!     InMemoryKVStore::new(),
//! )?;
//! service.initialize(&owner)?;
//!
//! let user = Principal::from("wallet_1");
//! let root = service.send_anonymous_message(&user, "Hello, anonymous world".into())?;
//! let reply = service.reply_to_message(&user, "Hello back from the thread".into(), root, false)?;
//! assert_eq!(service.get_message_depth(reply), Some(1));
//! ```

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod service;

pub use config::{ConfigError, ServiceConfig};
pub use service::{AnonymityService, OpenError};

/// Commonly used types.
pub mod prelude {
    pub use crate::adapters::{InMemoryKVStore, ManualClock};
    pub use crate::config::{ConfigError, ServiceConfig};
    pub use crate::domain::{
        AnonymityError, BulkSendResult, Lifecycle, Message, MessageId, Principal, RateLimits,
        RateRecord, ServiceStatus, Timestamp, MAX_REPLY_DEPTH,
    };
    pub use crate::ports::{AnonymityServiceApi, KeyValueStore, SystemTimeSource, TimeSource};
    pub use crate::service::{AnonymityService, OpenError};
}

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Subsystem identifier.
pub const SUBSYSTEM_ID: u8 = 18;

/// Subsystem name.
pub const SUBSYSTEM_NAME: &str = "Anonymous Messaging";
