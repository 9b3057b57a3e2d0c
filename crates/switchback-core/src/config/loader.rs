//! Loading configuration from strings, files and the environment

use super::types::FailoverConfig;
use crate::error::{Error, Result};
use camino::Utf8Path;
use serde::de::DeserializeOwned;
use std::env;
use std::fs;
use std::str::FromStr;

pub const ENV_POLICY: &str = "SWITCHBACK_POLICY";
pub const ENV_MAX_FAILOVERS: &str = "SWITCHBACK_MAX_FAILOVERS";
pub const ENV_MAX_RETRIES: &str = "SWITCHBACK_MAX_RETRIES";
pub const ENV_DELAY_BASE_MS: &str = "SWITCHBACK_DELAY_BASE_MS";
pub const ENV_DELAY_CAP_MS: &str = "SWITCHBACK_DELAY_CAP_MS";
pub const ENV_COUNTER_SCOPE: &str = "SWITCHBACK_COUNTER_SCOPE";

impl FailoverConfig {
    /// Parse a YAML document
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON document
    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a `.yaml`, `.yml` or `.json` file
    pub fn from_path(path: &Utf8Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        match path.extension() {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
            Some("json") => Self::from_json_str(&content),
            _ => Err(Error::unsupported_config_format(path.as_str())),
        }
    }

    /// Read a file, then apply `SWITCHBACK_*` overrides
    pub fn load(path: &Utf8Path) -> Result<Self> {
        Self::from_path(path)?.apply_env_overrides()
    }

    /// Apply `SWITCHBACK_*` environment variables on top of this config
    ///
    /// Overrides target the default policy and the counter scope.
    pub fn apply_env_overrides(mut self) -> Result<Self> {
        if let Ok(val) = env::var(ENV_POLICY) {
            self.default.policy = parse_kebab(ENV_POLICY, &val)?;
        }

        if let Ok(val) = env::var(ENV_MAX_FAILOVERS) {
            self.default.max_failovers = parse_number(ENV_MAX_FAILOVERS, &val)?;
        }

        if let Ok(val) = env::var(ENV_MAX_RETRIES) {
            self.default.max_retries = parse_number(ENV_MAX_RETRIES, &val)?;
        }

        if let Ok(val) = env::var(ENV_DELAY_BASE_MS) {
            self.default.delay_base_ms = parse_number(ENV_DELAY_BASE_MS, &val)?;
        }

        if let Ok(val) = env::var(ENV_DELAY_CAP_MS) {
            self.default.delay_cap_ms = parse_number(ENV_DELAY_CAP_MS, &val)?;
        }

        if let Ok(val) = env::var(ENV_COUNTER_SCOPE) {
            self.counter_scope = parse_kebab(ENV_COUNTER_SCOPE, &val)?;
        }

        self.validate()?;
        Ok(self)
    }
}

fn parse_number<N: FromStr>(var: &str, value: &str) -> Result<N> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::invalid_config(format!("{var} must be a valid number")))
}

/// Parse a kebab-case enum name the same way the config files spell it
fn parse_kebab<T: DeserializeOwned>(var: &str, value: &str) -> Result<T> {
    serde_json::from_value(serde_json::Value::String(value.trim().to_string()))
        .map_err(|_| Error::invalid_config(format!("{var} has unknown value '{value}'")))
}
