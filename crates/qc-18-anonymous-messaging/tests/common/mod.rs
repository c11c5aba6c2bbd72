//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use qc_18_anonymous_messaging::prelude::*;
use tracing_subscriber::EnvFilter;

pub type TestService = AnonymityService<ManualClock, InMemoryKVStore>;

/// Installs a test subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

pub fn deployer() -> Principal {
    Principal::from("deployer")
}

pub fn wallet(n: u8) -> Principal {
    Principal::new(format!("wallet_{n}"))
}

/// Deployed but not yet initialized.
pub fn deployed() -> (TestService, ManualClock) {
    init_tracing();
    let clock = ManualClock::new(1);
    let service = AnonymityService::new(
        ServiceConfig::new(deployer()),
        clock.clone(),
        InMemoryKVStore::new(),
    )
    .expect("default config is valid");
    (service, clock)
}

/// Deployed and initialized by the owner.
pub fn initialized() -> (TestService, ManualClock) {
    let (service, clock) = deployed();
    service.initialize(&deployer()).expect("owner initializes");
    (service, clock)
}
