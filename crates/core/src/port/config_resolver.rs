// Configuration Resolver Port (Interface)
// Materializes `${...}` placeholders in queue names and forward targets
// before binding resolution.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigResolverError {
    #[error("unknown configuration key: {0}")]
    UnknownKey(String),
}

/// Configuration resolver trait
pub trait ConfigResolver: Send + Sync {
    /// Resolve a `${key}` placeholder (or a bare key) to its configured value
    fn resolve(&self, placeholder: &str) -> Result<String, ConfigResolverError>;
}

/// Strip the placeholder markers, leaving the bare lookup key
pub fn placeholder_key(raw: &str) -> String {
    raw.replace(['$', '{', '}'], "").trim().to_string()
}

/// Resolver backed by the process environment (production default)
pub struct EnvResolver;

impl ConfigResolver for EnvResolver {
    fn resolve(&self, placeholder: &str) -> Result<String, ConfigResolverError> {
        let key = placeholder_key(placeholder);
        std::env::var(&key).map_err(|_| ConfigResolverError::UnknownKey(key))
    }
}

// ============================================================================
// Mock Implementation for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;

    /// Fixed-map resolver for tests
    pub struct MapResolver {
        entries: HashMap<String, String>,
    }

    impl MapResolver {
        pub fn new(entries: impl IntoIterator<Item = (String, String)>) -> Self {
            Self {
                entries: entries.into_iter().collect(),
            }
        }
    }

    impl ConfigResolver for MapResolver {
        fn resolve(&self, placeholder: &str) -> Result<String, ConfigResolverError> {
            let key = placeholder_key(placeholder);
            self.entries
                .get(&key)
                .cloned()
                .ok_or(ConfigResolverError::UnknownKey(key))
        }
    }
}
