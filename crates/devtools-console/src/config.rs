use crate::memo::{MemoCacheBuilder, DEFAULT_CACHE_CAPACITY};

pub const DEFAULT_PORT: u16 = 6771;

pub const ENV_PORT: &str = "DEVTOOLS_CONSOLE_PORT";
pub const ENV_CACHE_CAPACITY: &str = "DEVTOOLS_CONSOLE_CACHE_CAPACITY";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}: expected {expected}")]
    Invalid {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Runtime settings, read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Port of the console HTTP API.
    pub port: u16,
    /// Settled highlight results kept in memory; `None` keeps everything.
    pub cache_capacity: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            cache_capacity: Some(DEFAULT_CACHE_CAPACITY),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(value) = lookup(ENV_PORT) {
            config.port = value.trim().parse().map_err(|_| ConfigError::Invalid {
                var: ENV_PORT,
                value: value.clone(),
                expected: "a port number",
            })?;
        }

        if let Some(value) = lookup(ENV_CACHE_CAPACITY) {
            config.cache_capacity = match value.trim() {
                "unbounded" | "0" => None,
                other => Some(other.parse().map_err(|_| ConfigError::Invalid {
                    var: ENV_CACHE_CAPACITY,
                    value: value.clone(),
                    expected: "a positive number or \"unbounded\"",
                })?),
            };
        }

        Ok(config)
    }

    pub fn addr(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }

    pub fn cache_builder(&self) -> MemoCacheBuilder {
        match self.cache_capacity {
            Some(capacity) => MemoCacheBuilder::new().capacity(capacity),
            None => MemoCacheBuilder::new().unbounded(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn test_defaults() {
        assert_eq!(from(&[]).unwrap(), Config::default());
        assert_eq!(Config::default().addr(), "127.0.0.1:6771");
    }

    #[test]
    fn test_overrides() {
        let config = from(&[(ENV_PORT, "7000"), (ENV_CACHE_CAPACITY, "unbounded")]).unwrap();
        assert_eq!(config.port, 7000);
        assert_eq!(config.cache_capacity, None);

        let config = from(&[(ENV_CACHE_CAPACITY, "12")]).unwrap();
        assert_eq!(config.cache_capacity, Some(12));
    }

    #[test]
    fn test_invalid_values_are_reported() {
        let err = from(&[(ENV_PORT, "http")]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid value \"http\" for DEVTOOLS_CONSOLE_PORT: expected a port number"
        );
        assert!(from(&[(ENV_CACHE_CAPACITY, "-1")]).is_err());
    }
}
