//! # Rate Limiter (Anti-Spam)
//!
//! Per-identity windowed counter.
//!
//! ## Algorithm: Window-Check-And-Record
//!
//! 1. Missing record: treat as a fresh window starting at `now`, count 0
//! 2. `now - window_start >= window`: reset to `(now, 0)`
//! 3. `count >= max_per_window`: reject, record unchanged
//! 4. Otherwise: `count + 1`
//!
//! `check` only computes the updated record; it is written by `commit`
//! once the whole admission has been accepted (INVARIANT-4).

use super::entities::{Principal, RateRecord, Timestamp};
use super::errors::AnonymityError;
use super::value_objects::RateLimits;
use std::collections::HashMap;

/// Rate records keyed by identity.
#[derive(Clone, Debug, Default)]
pub struct RateLimiter {
    records: HashMap<Principal, RateRecord>,
}

impl RateLimiter {
    /// Creates an empty limiter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a limiter from persisted records.
    pub fn restore(records: impl IntoIterator<Item = (Principal, RateRecord)>) -> Self {
        Self {
            records: records.into_iter().collect(),
        }
    }

    /// Current record for `who`, if any send was ever rate-checked.
    pub fn get(&self, who: &Principal) -> Option<&RateRecord> {
        self.records.get(who)
    }

    /// Number of tracked identities.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if no identity is tracked.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Computes the record that admitting one more send would produce.
    ///
    /// # Errors
    /// - `RateLimitExceeded` if the caller's current window is at capacity
    pub fn check(
        &self,
        who: &Principal,
        now: Timestamp,
        limits: &RateLimits,
    ) -> Result<RateRecord, AnonymityError> {
        let mut record = self
            .records
            .get(who)
            .copied()
            .unwrap_or_else(|| RateRecord::fresh(now));

        if record.is_expired(now, limits.window) {
            record = RateRecord::fresh(now);
        }

        if record.count_in_window >= limits.max_per_window {
            return Err(AnonymityError::RateLimitExceeded {
                count: record.count_in_window,
                max: limits.max_per_window,
            });
        }

        record.count_in_window += 1;
        Ok(record)
    }

    /// Stores a record produced by `check`.
    pub fn commit(&mut self, who: Principal, record: RateRecord) {
        self.records.insert(who, record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(window: u64, max_per_window: u64) -> RateLimits {
        RateLimits {
            window,
            max_per_window,
        }
    }

    fn send(limiter: &mut RateLimiter, who: &Principal, now: Timestamp, l: &RateLimits) -> bool {
        match limiter.check(who, now, l) {
            Ok(record) => {
                limiter.commit(who.clone(), record);
                true
            }
            Err(_) => false,
        }
    }

    #[test]
    fn test_allows_up_to_max_then_rejects() {
        let mut limiter = RateLimiter::new();
        let who = Principal::from("wallet_1");
        let l = limits(10_000, 3);

        assert!(send(&mut limiter, &who, 1, &l));
        assert!(send(&mut limiter, &who, 2, &l));
        assert!(send(&mut limiter, &who, 3, &l));
        assert!(!send(&mut limiter, &who, 4, &l));

        // Rejection leaves the record unchanged
        assert_eq!(limiter.get(&who).unwrap().count_in_window, 3);
        assert_eq!(limiter.get(&who).unwrap().window_start, 1);
    }

    #[test]
    fn test_window_resets_after_expiry() {
        let mut limiter = RateLimiter::new();
        let who = Principal::from("wallet_1");
        let l = limits(10, 1);

        assert!(send(&mut limiter, &who, 100, &l));
        assert!(!send(&mut limiter, &who, 109, &l));
        assert!(send(&mut limiter, &who, 110, &l));

        let record = limiter.get(&who).unwrap();
        assert_eq!(record.window_start, 110);
        assert_eq!(record.count_in_window, 1);
    }

    #[test]
    fn test_raised_limit_applies_without_reset() {
        let mut limiter = RateLimiter::new();
        let who = Principal::from("wallet_1");

        for t in 0..3 {
            assert!(send(&mut limiter, &who, t, &limits(10_000, 3)));
        }
        assert!(!send(&mut limiter, &who, 3, &limits(10_000, 3)));

        assert!(send(&mut limiter, &who, 4, &limits(10_000, 5)));
        let record = limiter.get(&who).unwrap();
        assert_eq!(record.window_start, 0);
        assert_eq!(record.count_in_window, 4);
    }

    #[test]
    fn test_identities_are_independent() {
        let mut limiter = RateLimiter::new();
        let a = Principal::from("wallet_1");
        let b = Principal::from("wallet_2");
        let l = limits(100, 1);

        assert!(send(&mut limiter, &a, 0, &l));
        assert!(!send(&mut limiter, &a, 1, &l));
        assert!(send(&mut limiter, &b, 1, &l));
        assert_eq!(limiter.len(), 2);
    }

    #[test]
    fn test_check_does_not_mutate() {
        let limiter = RateLimiter::new();
        let who = Principal::from("wallet_1");
        let record = limiter.check(&who, 5, &limits(10, 3)).unwrap();

        assert_eq!(record.count_in_window, 1);
        assert!(limiter.get(&who).is_none());
    }

    #[test]
    fn test_zero_max_rejects_everything() {
        let limiter = RateLimiter::new();
        let who = Principal::from("wallet_1");
        assert!(matches!(
            limiter.check(&who, 0, &limits(10, 0)),
            Err(AnonymityError::RateLimitExceeded { count: 0, max: 0 })
        ));
    }
}
