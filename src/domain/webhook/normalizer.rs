//! Key normalization for users and webhook ids

#[cfg(test)]
use mockall::automock;

/// Canonicalizes a user or id key before it is looked up or stored
///
/// Implementations must be total and idempotent: normalizing an already
/// normalized key returns it unchanged.
#[cfg_attr(test, automock)]
pub trait KeyNormalizer: Send + Sync {
    fn normalize(&self, key: &str) -> String;
}

/// Lowercases keys
#[derive(Debug, Clone, Copy, Default)]
pub struct LowercaseKeyNormalizer;

impl KeyNormalizer for LowercaseKeyNormalizer {
    fn normalize(&self, key: &str) -> String {
        key.to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercase() {
        let normalizer = LowercaseKeyNormalizer;

        assert_eq!(normalizer.normalize("Alice"), "alice");
        assert_eq!(normalizer.normalize("W1-ABC"), "w1-abc");
    }

    #[test]
    fn test_lowercase_is_idempotent() {
        let normalizer = LowercaseKeyNormalizer;

        for key in ["Alice", "ÄBC", "already-lower", ""] {
            let once = normalizer.normalize(key);
            assert_eq!(normalizer.normalize(&once), once);
        }
    }
}
