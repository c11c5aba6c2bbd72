//! # Ports Layer
//!
//! - `inbound.rs` - Driving port (the API this subsystem exposes)
//! - `outbound.rs` - Driven ports (clock and key-value storage)

pub mod inbound;
pub mod outbound;

pub use inbound::AnonymityServiceApi;
pub use outbound::{BatchOperation, KeyValueStore, ScanResult, SystemTimeSource, TimeSource};
