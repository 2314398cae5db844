//! Configuration-backed placeholder resolver
//!
//! Layers an optional `hopper.toml` under `HOPPER_*` environment overrides
//! and exposes the result through the core ConfigResolver port, so binding
//! specs can carry `${...}` placeholders for queue names and targets.

use anyhow::Result;
use hopper_core::port::config_resolver::{placeholder_key, ConfigResolver, ConfigResolverError};

pub struct SettingsResolver {
    settings: config::Config,
}

impl SettingsResolver {
    pub fn load() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("hopper").required(false))
            .add_source(config::Environment::with_prefix("HOPPER").separator("__"))
            .build()?;
        Ok(Self { settings })
    }
}

impl ConfigResolver for SettingsResolver {
    fn resolve(&self, placeholder: &str) -> Result<String, ConfigResolverError> {
        let key = placeholder_key(placeholder);
        self.settings
            .get_string(&key)
            .map_err(|_| ConfigResolverError::UnknownKey(key))
    }
}
