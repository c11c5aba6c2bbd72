//! # Adapters Module
//!
//! - `memory`: ordered in-memory `KeyValueStore`
//! - `clock`: manually driven `TimeSource`
//! - `codec`: key layout and bincode records for ledger persistence

pub mod clock;
pub mod codec;
pub mod memory;

pub use clock::ManualClock;
pub use memory::InMemoryKVStore;
