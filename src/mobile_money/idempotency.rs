use std::fmt;

use serde::{Deserialize, Serialize};

/// Client-generated token for one logical attempt.
///
/// Format: `<unix-millis>-<16 hex chars>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn generate() -> Self {
        let millis = chrono::Utc::now().timestamp_millis();
        let suffix: u64 = rand::random();
        Self(format!("{}-{:016x}", millis, suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_keys_are_unique() {
        let keys: HashSet<_> = (0..1_000).map(|_| IdempotencyKey::generate()).collect();
        assert_eq!(keys.len(), 1_000);
    }

    #[test]
    fn test_key_format() {
        let key = IdempotencyKey::generate();
        let (millis, suffix) = key.as_str().split_once('-').unwrap();
        assert!(millis.parse::<i64>().unwrap() > 0);
        assert_eq!(suffix.len(), 16);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
