//! Harness configuration via `stress.toml`
//!
//! A run is described by a small config file. Any value can be overridden on
//! the command line; missing values fall back to the defaults below, which
//! are tuned to maximize contention: ten workers on a three-key table for two
//! seconds.

use crate::error::{HarnessError, HarnessResult, StoreErrorKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Config file name looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "stress.toml";

/// Where the store keeps its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// Purely in-memory store; nothing survives a shutdown
    Memory,
    /// File-backed store with restart durability
    #[default]
    Persistent,
}

impl StorageMode {
    /// Stable name used in config files
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageMode::Memory => "memory",
            StorageMode::Persistent => "persistent",
        }
    }
}

impl fmt::Display for StorageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageMode {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(StorageMode::Memory),
            "persistent" => Ok(StorageMode::Persistent),
            other => Err(HarnessError::Config(format!(
                "invalid storage mode '{}', expected \"memory\" or \"persistent\"",
                other
            ))),
        }
    }
}

/// Options applied to every session a store opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// How long a statement may wait for a lock before failing
    pub lock_timeout: Duration,
    /// Whether each statement commits on its own
    pub autocommit: bool,
    /// Backing storage of the store
    pub storage_mode: StorageMode,
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions {
            lock_timeout: Duration::from_millis(default_lock_timeout_ms()),
            autocommit: true,
            storage_mode: StorageMode::Persistent,
        }
    }
}

/// Harness configuration loaded from `stress.toml`.
///
/// # Example
///
/// ```toml
/// threads = 10
/// row_count = 3
/// duration_ms = 2000
/// lock_timeout_ms = 2000
/// storage = "persistent"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Number of contention workers
    #[serde(default = "default_threads")]
    pub threads: usize,
    /// Size of the contended key domain
    #[serde(default = "default_row_count")]
    pub row_count: u32,
    /// Wall-clock run time of the contention scenario
    #[serde(default = "default_duration_ms")]
    pub duration_ms: u64,
    /// Lock wait timeout applied to every session
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
    /// Store backing storage
    #[serde(default)]
    pub storage: StorageMode,
    /// Number of shutdown issuers racing the writer
    #[serde(default = "default_shutdown_issuers")]
    pub shutdown_issuers: usize,
    /// How many times the scenarios are repeated
    #[serde(default = "default_passes")]
    pub passes: usize,
    /// Worker `i` is seeded with `seed_base + i`
    #[serde(default)]
    pub seed_base: u64,
    /// Store error kinds contention workers may tolerate (empty = strict)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub acceptable_errors: Vec<StoreErrorKind>,
    /// Directory for persistent stores; a fresh temp directory when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

fn default_threads() -> usize {
    10
}

fn default_row_count() -> u32 {
    3
}

fn default_duration_ms() -> u64 {
    2000
}

fn default_lock_timeout_ms() -> u64 {
    2000
}

fn default_shutdown_issuers() -> usize {
    2
}

fn default_passes() -> usize {
    1
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            row_count: default_row_count(),
            duration_ms: default_duration_ms(),
            lock_timeout_ms: default_lock_timeout_ms(),
            storage: StorageMode::default(),
            shutdown_issuers: default_shutdown_issuers(),
            passes: default_passes(),
            seed_base: 0,
            acceptable_errors: Vec::new(),
            data_dir: None,
        }
    }
}

impl HarnessConfig {
    /// Contention run time
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// Lock wait timeout
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Session options derived from this config (autocommit on)
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            lock_timeout: self.lock_timeout(),
            autocommit: true,
            storage_mode: self.storage,
        }
    }

    /// Reject configs no scenario can run with.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Config`] naming the first offending field.
    pub fn validate(&self) -> HarnessResult<()> {
        if self.threads == 0 {
            return Err(HarnessError::Config("threads must be at least 1".into()));
        }
        if self.row_count == 0 {
            return Err(HarnessError::Config("row_count must be at least 1".into()));
        }
        if self.shutdown_issuers == 0 {
            return Err(HarnessError::Config(
                "shutdown_issuers must be at least 1".into(),
            ));
        }
        if self.passes == 0 {
            return Err(HarnessError::Config("passes must be at least 1".into()));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Strata stress harness configuration
#
# Contention scenario: `threads` workers hammer `row_count` keys for `duration_ms`.
threads = 10
row_count = 3
duration_ms = 2000

# Lock wait timeout applied to every session (milliseconds).
lock_timeout_ms = 2000

# Store storage: "persistent" (default) or "memory".
# The shutdown scenario is skipped in memory mode.
storage = "persistent"

# Shutdown scenario: number of sessions racing a shutdown against the writer.
shutdown_issuers = 2

# Repeat every scenario this many times.
passes = 1

# Worker i is seeded with seed_base + i, so failing streams can be replayed.
seed_base = 0

# Store error kinds contention workers may tolerate. Empty means strict:
# every worker error fails the run.
# acceptable_errors = ["lock_timeout"]

# data_dir = "/tmp/strata-stress"
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: &Path) -> HarnessResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HarnessError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: HarnessConfig = toml::from_str(&content).map_err(|e| {
            HarnessError::Config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> HarnessResult<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml())?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> HarnessResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| HarnessError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
