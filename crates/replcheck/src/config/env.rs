//! Environment-based configuration.

use std::collections::HashMap;
use std::time::Duration;

use super::HarnessConfig;
use crate::error::{ExpectError, Result};
use crate::expect::PatternSpec;

/// Environment configuration prefix.
pub const DEFAULT_PREFIX: &str = "REPLCHECK";

/// Environment variable reader.
///
/// Values are snapshotted when the reader is created, so a reader built
/// with [`EnvConfig::from_vars`] never touches the process environment.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    prefix: String,
    vars: HashMap<String, String>,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::from_env(DEFAULT_PREFIX)
    }
}

impl EnvConfig {
    /// Read variables from the process environment.
    #[must_use]
    pub fn from_env(prefix: impl Into<String>) -> Self {
        Self::from_vars(prefix, std::env::vars())
    }

    /// Read variables from an explicit list.
    #[must_use]
    pub fn from_vars<I, K, V>(prefix: impl Into<String>, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            prefix: prefix.into(),
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Build the full environment variable name.
    fn var_name(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_uppercase()
        } else {
            format!("{}_{}", self.prefix, name.to_uppercase())
        }
    }

    /// Get a string value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<String> {
        self.vars.get(&self.var_name(name)).cloned()
    }

    /// Get a parsed value, failing on a malformed one.
    pub fn parse<T>(&self, name: &str) -> Result<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(name)
            .map(|v| {
                v.trim().parse().map_err(|e| {
                    ExpectError::config(format!("{}={v:?}: {e}", self.var_name(name)))
                })
            })
            .transpose()
    }

    /// Get a duration in milliseconds.
    pub fn duration_millis(&self, name: &str) -> Result<Option<Duration>> {
        Ok(self.parse::<u64>(name)?.map(Duration::from_millis))
    }

    /// Check if a variable is set.
    #[must_use]
    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Overlay every recognized variable onto `config`.
    pub fn apply(&self, config: &mut HarnessConfig) -> Result<()> {
        if let Some(prompt) = self.get("prompt") {
            config.markers.prompt = PatternSpec::literal(prompt);
        }
        if let Some(continuation) = self.get("continuation") {
            config.markers.continuation = PatternSpec::literal(continuation);
        }
        if let Some(incomplete) = self.get("incomplete") {
            config.markers.incomplete = PatternSpec::regex(incomplete);
        }
        if let Some(step) = self.duration_millis("step_timeout_ms")? {
            config.timeouts.step = step;
        }
        if let Some(startup) = self.duration_millis("startup_timeout_ms")? {
            config.timeouts.startup = startup;
        }
        if let Some(resync) = self.duration_millis("resync_timeout_ms")? {
            config.timeouts.resync = resync;
        }
        if let Some(quit) = self.get("quit_command") {
            config.session.shutdown.quit_command = quit;
        }
        if let Some(grace) = self.duration_millis("grace_ms")? {
            config.session.shutdown.grace = grace;
        }
        Ok(())
    }
}
