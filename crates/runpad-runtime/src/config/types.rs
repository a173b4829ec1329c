//! Configuration types.
//!
//! All types implement [`Default`] for compile-time fallback values.

use crate::engine::{ExecutionLimits, DEFAULT_MAX_OUTPUT_BYTES, DEFAULT_TIMEOUT};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure.
///
/// # Example
///
/// ```
/// use runpad_runtime::config::RunpadConfig;
///
/// let config = RunpadConfig::default();
/// assert!(!config.debug);
/// assert_eq!(config.limits.timeout_ms, 5_000);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunpadConfig {
    /// Enable debug mode (verbose logging).
    pub debug: bool,

    /// Runtime bootstrap configuration.
    pub runtime: RuntimeConfig,

    /// Execution limits.
    pub limits: LimitsConfig,

    /// Interactive editor configuration.
    pub editor: EditorConfig,

    /// File logging configuration.
    pub logging: LoggingConfig,
}

impl RunpadConfig {
    /// Creates a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serializes to TOML string.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Deserializes from TOML string.
    ///
    /// # Errors
    ///
    /// Returns error if deserialization fails.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Merges another config into this one.
    ///
    /// Values from `other` override values in `self` only if they
    /// differ from the default.
    pub fn merge(&mut self, other: &Self) {
        let default = Self::default();

        if other.debug != default.debug {
            self.debug = other.debug;
        }

        self.runtime.merge(&other.runtime);
        self.limits.merge(&other.limits);
        self.editor.merge(&other.editor);
        self.logging.merge(&other.logging);
    }
}

/// Runtime bootstrap configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Bootstrap artifact: `"embedded"`, a file path, or an `http(s)://` URL.
    pub bootstrap: String,

    /// Timeout for fetching a remote artifact (milliseconds).
    pub fetch_timeout_ms: u64,

    /// Load the runtime at startup instead of on the first run.
    pub preload: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            bootstrap: "embedded".into(),
            fetch_timeout_ms: 30_000,
            preload: false,
        }
    }
}

impl RuntimeConfig {
    /// Fetch timeout as a [`Duration`].
    #[must_use]
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    fn merge(&mut self, other: &Self) {
        let default = Self::default();

        if other.bootstrap != default.bootstrap {
            self.bootstrap.clone_from(&other.bootstrap);
        }
        if other.fetch_timeout_ms != default.fetch_timeout_ms {
            self.fetch_timeout_ms = other.fetch_timeout_ms;
        }
        if other.preload != default.preload {
            self.preload = other.preload;
        }
    }
}

/// Execution limits configuration.
///
/// A value of `0` disables the corresponding limit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LimitsConfig {
    /// Wall-clock deadline per run (milliseconds).
    pub timeout_ms: u64,

    /// Instruction budget per run.
    pub max_instructions: u64,

    /// Captured output cap (bytes).
    pub max_output_bytes: usize,

    /// Interpreter heap cap (bytes).
    pub max_memory_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
            max_instructions: 0,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            max_memory_bytes: 64 * 1024 * 1024,
        }
    }
}

impl LimitsConfig {
    /// Converts to engine limits.
    #[must_use]
    pub fn execution_limits(&self) -> ExecutionLimits {
        ExecutionLimits {
            timeout: (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms)),
            max_instructions: (self.max_instructions > 0).then_some(self.max_instructions),
            max_output_bytes: (self.max_output_bytes > 0).then_some(self.max_output_bytes),
        }
    }

    /// Memory cap, if enabled.
    #[must_use]
    pub fn memory_limit(&self) -> Option<usize> {
        (self.max_memory_bytes > 0).then_some(self.max_memory_bytes)
    }

    fn merge(&mut self, other: &Self) {
        let default = Self::default();

        if other.timeout_ms != default.timeout_ms {
            self.timeout_ms = other.timeout_ms;
        }
        if other.max_instructions != default.max_instructions {
            self.max_instructions = other.max_instructions;
        }
        if other.max_output_bytes != default.max_output_bytes {
            self.max_output_bytes = other.max_output_bytes;
        }
        if other.max_memory_bytes != default.max_memory_bytes {
            self.max_memory_bytes = other.max_memory_bytes;
        }
    }
}

/// Interactive editor configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EditorConfig {
    /// Line-editor history file (defaults to `~/.runpad/history`).
    pub history_file: Option<PathBuf>,

    /// File name used by `:save` without an argument.
    pub download_name: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history_file: None,
            download_name: "lua_code.lua".into(),
        }
    }
}

impl EditorConfig {
    /// History file path, falling back to `~/.runpad/history`.
    #[must_use]
    pub fn history_file_or_default(&self) -> PathBuf {
        self.history_file
            .clone()
            .unwrap_or_else(|| super::default_config_dir().join("history"))
    }

    fn merge(&mut self, other: &Self) {
        let default = Self::default();

        if other.history_file.is_some() {
            self.history_file.clone_from(&other.history_file);
        }
        if other.download_name != default.download_name {
            self.download_name.clone_from(&other.download_name);
        }
    }
}

/// File logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Write logs to a file.
    pub file: bool,

    /// Log directory (defaults to `~/.runpad/logs`).
    pub file_path: Option<PathBuf>,

    /// Level for the file layer.
    pub file_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: false,
            file_path: None,
            file_level: "debug".into(),
        }
    }
}

impl LoggingConfig {
    /// Log directory, falling back to `~/.runpad/logs`.
    #[must_use]
    pub fn resolved_file_path(&self) -> PathBuf {
        self.file_path
            .clone()
            .unwrap_or_else(|| super::default_config_dir().join("logs"))
    }

    /// `EnvFilter` directive for the file layer.
    ///
    /// Noisy HTTP/TLS crates are held at `warn`.
    #[must_use]
    pub fn file_filter_directive(&self) -> String {
        format!(
            "{},hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn,rustyline=warn",
            self.file_level
        )
    }

    fn merge(&mut self, other: &Self) {
        let default = Self::default();

        if other.file != default.file {
            self.file = other.file;
        }
        if other.file_path.is_some() {
            self.file_path.clone_from(&other.file_path);
        }
        if other.file_level != default.file_level {
            self.file_level.clone_from(&other.file_level);
        }
    }
}
