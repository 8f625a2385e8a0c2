//! Engine configuration via `runkeeper.toml`
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working configuration. Values are validated when the config is loaded and
//! again when a [`Database`](super::Database) is built from it.

use std::path::Path;
use std::time::Duration;

use runkeeper_core::{Error, Result};
use runkeeper_storage::QueueOptions;
use serde::{Deserialize, Serialize};

/// Config file name looked up by hosts that keep one next to their data.
pub const CONFIG_FILE_NAME: &str = "runkeeper.toml";

/// Queue delivery settings, persisted under `[queue]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Deliveries of one message before it is dead-lettered
    #[serde(default = "default_max_deliveries")]
    pub max_deliveries: u32,
    /// How long a consumer blocks waiting for a delivery
    #[serde(default = "default_receive_timeout_ms")]
    pub receive_timeout_ms: u64,
    /// How long an unacknowledged delivery stays invisible before redelivery
    #[serde(default = "default_visibility_timeout_ms")]
    pub visibility_timeout_ms: u64,
}

fn default_max_deliveries() -> u32 {
    5
}

fn default_receive_timeout_ms() -> u64 {
    100
}

fn default_visibility_timeout_ms() -> u64 {
    30_000
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_deliveries: default_max_deliveries(),
            receive_timeout_ms: default_receive_timeout_ms(),
            visibility_timeout_ms: default_visibility_timeout_ms(),
        }
    }
}

/// Consumer pool settings, persisted under `[worker]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Number of consumer threads
    #[serde(default = "default_consumers")]
    pub consumers: usize,
}

fn default_consumers() -> usize {
    4
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            consumers: default_consumers(),
        }
    }
}

/// Engine configuration loaded from `runkeeper.toml`.
///
/// # Example
///
/// ```toml
/// [queue]
/// max_deliveries = 5
/// receive_timeout_ms = 100
/// visibility_timeout_ms = 30000
///
/// [worker]
/// consumers = 4
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunkeeperConfig {
    /// Queue delivery settings
    #[serde(default)]
    pub queue: QueueConfig,
    /// Consumer pool settings
    #[serde(default)]
    pub worker: WorkerConfig,
}

impl RunkeeperConfig {
    /// Reject values the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.queue.max_deliveries == 0 {
            return Err(Error::invalid_input(
                "queue.max_deliveries must be at least 1",
            ));
        }
        if self.queue.receive_timeout_ms == 0 {
            return Err(Error::invalid_input(
                "queue.receive_timeout_ms must be at least 1",
            ));
        }
        if self.queue.visibility_timeout_ms == 0 {
            return Err(Error::invalid_input(
                "queue.visibility_timeout_ms must be at least 1",
            ));
        }
        if self.worker.consumers == 0 {
            return Err(Error::invalid_input("worker.consumers must be at least 1"));
        }
        Ok(())
    }

    /// Queue options derived from the `[queue]` section.
    pub fn queue_options(&self) -> QueueOptions {
        QueueOptions {
            max_deliveries: self.queue.max_deliveries,
            visibility_timeout: Duration::from_millis(self.queue.visibility_timeout_ms),
        }
    }

    /// Blocking receive timeout for consumers.
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.queue.receive_timeout_ms)
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Runkeeper engine configuration

[queue]
# Deliveries of one message before it is dead-lettered (default: 5)
max_deliveries = 5
# How long a consumer blocks waiting for a delivery, in ms (default: 100)
receive_timeout_ms = 100
# Unacknowledged deliveries become visible again after this many ms (default: 30000)
visibility_timeout_ms = 30000

[worker]
# Number of consumer threads (default: 4)
consumers = 4
"#
    }

    /// Parse and validate config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the text does not parse or a value is invalid.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: RunkeeperConfig = toml::from_str(content)
            .map_err(|e| Error::invalid_input(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate config from a file path.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read, `InvalidInput` if it cannot be
    /// parsed or holds an invalid value.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content).map_err(|e| match e {
            Error::InvalidInput { reason } => Error::invalid_input(format!(
                "Invalid config file '{}': {}",
                path.display(),
                reason
            )),
            other => other,
        })
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml())?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::internal(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
