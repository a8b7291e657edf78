//! Engine configuration.
//!
//! Settings come from three layers, highest priority first:
//!
//! 1. Environment variables (`JOBSYNC_*`)
//! 2. The `[engine]` table of a TOML file (`.jobsync.toml` by default)
//! 3. Built-in defaults
//!
//! ```toml
//! [engine]
//! worker_count = 8
//! lock_wait_timeout_ms = 30000
//! system_owner = "system"
//! event_channel_capacity = 1024
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CONFIG_FILE, DEFAULT_EVENT_CHANNEL_CAPACITY, DEFAULT_WORKER_COUNT, ENV_PREFIX,
    SYSTEM_OWNER,
};

/// Tunables for a [`JobExecutor`](crate::JobExecutor).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of worker tasks executing jobs.
    pub worker_count: usize,
    /// Upper bound on the time a job waits for its sync keys. `None` waits forever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_wait_timeout_ms: Option<u64>,
    /// Owning identity used when a command cannot resolve its own.
    pub system_owner: String,
    /// Buffer size of the lifecycle event broadcast channel.
    pub event_channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
            lock_wait_timeout_ms: None,
            system_owner: SYSTEM_OWNER.to_string(),
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Loads `.jobsync.toml` from the working directory if present, then
    /// applies environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = if let Ok(contents) = std::fs::read_to_string(DEFAULT_CONFIG_FILE) {
            Self::from_toml(&contents)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a specific file, then applies environment overrides.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;
        let mut config = Self::from_toml(&contents)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parses the `[engine]` table of a TOML document. A missing table yields defaults.
    ///
    /// # Examples
    ///
    /// ```
    /// use jobsync::EngineConfig;
    ///
    /// let config = EngineConfig::from_toml("[engine]\nworker_count = 2\n").unwrap();
    /// assert_eq!(config.worker_count, 2);
    /// assert_eq!(config.system_owner, "system");
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        #[derive(Deserialize)]
        struct FullConfig {
            #[serde(default)]
            engine: EngineConfig,
        }

        let full: FullConfig =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(full.engine)
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Applies `JOBSYNC_*` overrides read through `lookup`.
    ///
    /// Unparseable values are ignored. `JOBSYNC_LOCK_WAIT_TIMEOUT_MS` set to
    /// an empty string or `none` clears the wait bound.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| lookup(&format!("{ENV_PREFIX}{suffix}"));

        if let Some(v) = var("WORKER_COUNT").and_then(|v| v.trim().parse().ok()) {
            self.worker_count = v;
        }

        if let Some(raw) = var("LOCK_WAIT_TIMEOUT_MS") {
            let raw = raw.trim();
            if raw.is_empty() || raw.eq_ignore_ascii_case("none") {
                self.lock_wait_timeout_ms = None;
            } else if let Ok(v) = raw.parse() {
                self.lock_wait_timeout_ms = Some(v);
            }
        }

        if let Some(owner) = var("SYSTEM_OWNER") {
            self.system_owner = owner;
        }

        if let Some(v) = var("EVENT_CHANNEL_CAPACITY").and_then(|v| v.trim().parse().ok()) {
            self.event_channel_capacity = v;
        }
    }

    /// Rejects settings the executor cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_count == 0 {
            return Err(ConfigError::Invalid(
                "worker_count must be at least 1".to_string(),
            ));
        }
        if self.system_owner.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "system_owner must not be empty".to_string(),
            ));
        }
        if self.event_channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "event_channel_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// The lock wait bound as a [`Duration`].
    pub fn lock_wait_timeout(&self) -> Option<Duration> {
        self.lock_wait_timeout_ms.map(Duration::from_millis)
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error reading the configuration file.
    #[error("failed to read config file '{path}': {error}")]
    Io {
        /// Path to the configuration file.
        path: String,
        /// Error message.
        error: String,
    },
    /// Parse error in configuration.
    #[error("failed to parse config: {0}")]
    Parse(String),
    /// A setting is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.worker_count, 4);
        assert_eq!(config.lock_wait_timeout(), None);
        assert_eq!(config.system_owner, "system");
        assert_eq!(config.event_channel_capacity, 256);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml() {
        let toml = r#"
            [engine]
            worker_count = 8
            lock_wait_timeout_ms = 1500
            system_owner = "root-account"
        "#;
        let config = EngineConfig::from_toml(toml).unwrap();
        assert_eq!(config.worker_count, 8);
        assert_eq!(config.lock_wait_timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(config.system_owner, "root-account");
        assert_eq!(config.event_channel_capacity, 256);
    }

    #[test]
    fn test_missing_table_uses_defaults() {
        let config = EngineConfig::from_toml("[other]\nkey = 1\n").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_parse_error() {
        let err = EngineConfig::from_toml("[engine]\nworker_count = \"many\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_overrides() {
        let mut config = EngineConfig::default();
        config.apply_overrides(lookup(&[
            ("JOBSYNC_WORKER_COUNT", "16"),
            ("JOBSYNC_LOCK_WAIT_TIMEOUT_MS", "250"),
            ("JOBSYNC_SYSTEM_OWNER", "ops"),
            ("JOBSYNC_EVENT_CHANNEL_CAPACITY", "not-a-number"),
        ]));
        assert_eq!(config.worker_count, 16);
        assert_eq!(config.lock_wait_timeout_ms, Some(250));
        assert_eq!(config.system_owner, "ops");
        assert_eq!(config.event_channel_capacity, 256);

        config.apply_overrides(lookup(&[("JOBSYNC_LOCK_WAIT_TIMEOUT_MS", "none")]));
        assert_eq!(config.lock_wait_timeout_ms, None);
    }

    #[test]
    fn test_validate_rejects_zero_workers_and_empty_owner() {
        let config = EngineConfig {
            worker_count: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = EngineConfig {
            system_owner: "  ".to_string(),
            ..EngineConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[engine]\nevent_channel_capacity = 32").unwrap();
        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.event_channel_capacity, 32);

        let err = EngineConfig::from_file("/nonexistent/jobsync.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
