//! Content validation.
//!
//! Length is measured in characters (Unicode scalar values), not bytes.

use super::errors::AnonymityError;

/// Minimum content length in characters.
pub const MIN_CONTENT_LEN: usize = 10;

/// Maximum content length in characters.
pub const MAX_CONTENT_LEN: usize = 500;

/// Inclusive length bounds applied to every message body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContentPolicy {
    pub min_len: usize,
    pub max_len: usize,
}

impl Default for ContentPolicy {
    fn default() -> Self {
        Self {
            min_len: MIN_CONTENT_LEN,
            max_len: MAX_CONTENT_LEN,
        }
    }
}

impl ContentPolicy {
    /// Creates a policy with custom bounds.
    pub fn new(min_len: usize, max_len: usize) -> Self {
        Self { min_len, max_len }
    }

    /// Returns true iff `text` length lies within `[min_len, max_len]`.
    pub fn is_valid(&self, text: &str) -> bool {
        self.check(text).is_ok()
    }

    /// Validates `text`.
    ///
    /// # Errors
    /// - `InvalidMessageLength` if the length is outside the bounds
    pub fn check(&self, text: &str) -> Result<(), AnonymityError> {
        let length = text.chars().count();
        if length < self.min_len || length > self.max_len {
            return Err(AnonymityError::InvalidMessageLength {
                length,
                min: self.min_len,
                max: self.max_len,
            });
        }
        Ok(())
    }
}

/// Validates against the default bounds.
pub fn is_valid_content(text: &str) -> bool {
    ContentPolicy::default().is_valid(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_content_rejected() {
        assert!(!is_valid_content("Short"));
        assert!(!is_valid_content(""));
    }

    #[test]
    fn test_reasonable_content_accepted() {
        assert!(is_valid_content("This is a valid length message for testing"));
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let policy = ContentPolicy::new(10, 20);
        assert!(!policy.is_valid(&"a".repeat(9)));
        assert!(policy.is_valid(&"a".repeat(10)));
        assert!(policy.is_valid(&"a".repeat(20)));
        assert!(!policy.is_valid(&"a".repeat(21)));
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        let policy = ContentPolicy::new(10, 10);
        // 10 characters, 20 bytes
        let text = "éééééééééé";
        assert_eq!(text.len(), 20);
        assert!(policy.is_valid(text));
    }

    #[test]
    fn test_check_reports_length() {
        let err = ContentPolicy::default().check("Short").unwrap_err();
        assert_eq!(
            err,
            AnonymityError::InvalidMessageLength {
                length: 5,
                min: MIN_CONTENT_LEN,
                max: MAX_CONTENT_LEN,
            }
        );
    }
}
