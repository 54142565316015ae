//! Cache key derivation

use std::fmt;

/// Cache key for one commit: `{prefix}-{sha}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    prefix: String,
    sha: String,
}

impl CacheKey {
    pub fn new(prefix: impl Into<String>, sha: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            sha: sha.into(),
        }
    }

    /// Key the cache is saved under
    pub fn primary(&self) -> String {
        format!("{}-{}", self.prefix, self.sha)
    }

    /// Fallback prefixes tried when the primary key misses
    pub fn restore_keys(&self) -> Vec<String> {
        vec![format!("{}-", self.prefix)]
    }

    /// Whether a restored key is the primary key, ignoring case
    pub fn is_exact_match(&self, restored: &str) -> bool {
        restored.to_lowercase() == self.primary().to_lowercase()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.primary())
    }
}
