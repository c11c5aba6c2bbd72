//! Service configuration with environment overrides.

use crate::domain::entities::{
    Principal, DEFAULT_MAX_PER_WINDOW, DEFAULT_RATE_WINDOW, DEFAULT_SERVICE_FEE,
};
use crate::domain::validation::{ContentPolicy, MAX_CONTENT_LEN, MIN_CONTENT_LEN};
use crate::domain::value_objects::RateLimits;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use thiserror::Error;

/// Invalid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// An environment override could not be parsed.
    #[error("invalid value {value:?} for {var}")]
    InvalidValue { var: &'static str, value: String },

    /// Content bounds that no message could satisfy.
    #[error("invalid content bounds: min {min}, max {max}")]
    InvalidContentBounds { min: usize, max: usize },
}

/// Configuration for the Anonymous Messaging service.
///
/// The fee and rate-limit fields are the values `initialize` installs;
/// the owner can change them afterwards at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Deploying identity, the only one allowed to administer the service
    pub owner: Principal,

    /// Minimum content length in characters (inclusive)
    pub min_content_len: usize,

    /// Maximum content length in characters (inclusive)
    pub max_content_len: usize,

    /// Fee installed by `initialize`
    pub default_service_fee: u64,

    /// Rate window length installed by `initialize`
    pub default_rate_window: u64,

    /// Per-window capacity installed by `initialize`
    pub default_max_per_window: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::new(Principal::new("deployer"))
    }
}

impl ServiceConfig {
    /// Built-in defaults for the given owner.
    pub fn new(owner: Principal) -> Self {
        Self {
            owner,
            min_content_len: MIN_CONTENT_LEN,
            max_content_len: MAX_CONTENT_LEN,
            default_service_fee: DEFAULT_SERVICE_FEE,
            default_rate_window: DEFAULT_RATE_WINDOW,
            default_max_per_window: DEFAULT_MAX_PER_WINDOW,
        }
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `QC_ANON_MIN_CONTENT_LEN`: Minimum content length (default: 10)
    /// - `QC_ANON_MAX_CONTENT_LEN`: Maximum content length (default: 500)
    /// - `QC_ANON_SERVICE_FEE`: Initial service fee (default: 100)
    /// - `QC_ANON_RATE_WINDOW`: Initial rate window (default: 144)
    /// - `QC_ANON_MAX_PER_WINDOW`: Initial per-window capacity (default: 10)
    pub fn from_env(owner: Principal) -> Result<Self, ConfigError> {
        Self::from_lookup(owner, |var| env::var(var).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_lookup<F>(owner: Principal, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new(owner);

        override_from(&lookup, "QC_ANON_MIN_CONTENT_LEN", &mut config.min_content_len)?;
        override_from(&lookup, "QC_ANON_MAX_CONTENT_LEN", &mut config.max_content_len)?;
        override_from(&lookup, "QC_ANON_SERVICE_FEE", &mut config.default_service_fee)?;
        override_from(&lookup, "QC_ANON_RATE_WINDOW", &mut config.default_rate_window)?;
        override_from(
            &lookup,
            "QC_ANON_MAX_PER_WINDOW",
            &mut config.default_max_per_window,
        )?;

        config.validate()?;
        Ok(config)
    }

    /// Rejects bounds that would make every message invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_content_len == 0 || self.min_content_len > self.max_content_len {
            return Err(ConfigError::InvalidContentBounds {
                min: self.min_content_len,
                max: self.max_content_len,
            });
        }
        Ok(())
    }

    pub fn content_policy(&self) -> ContentPolicy {
        ContentPolicy::new(self.min_content_len, self.max_content_len)
    }

    pub fn rate_limits(&self) -> RateLimits {
        RateLimits {
            window: self.default_rate_window,
            max_per_window: self.default_max_per_window,
        }
    }
}

fn override_from<F, T>(lookup: &F, var: &'static str, target: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(value) = lookup(var) {
        *target = value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { var, value })?;
    }
    Ok(())
}
