//! Layered configuration.
//!
//! ```text
//! Priority (highest to lowest):
//!
//! ┌───────────────────────────────────────────┐
//! │  1. CLI flags (ConfigResolver)            │
//! ├───────────────────────────────────────────┤
//! │  2. Environment Variables (RUNPAD_*)      │
//! ├───────────────────────────────────────────┤
//! │  3. Project Config (.runpad/config.toml)  │
//! ├───────────────────────────────────────────┤
//! │  4. Global Config (~/.runpad/config.toml) │
//! ├───────────────────────────────────────────┤
//! │  5. Default Values (compile-time)         │
//! └───────────────────────────────────────────┘
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Config Field | Type |
//! |----------|--------------|------|
//! | `RUNPAD_DEBUG` | `debug` | bool |
//! | `RUNPAD_BOOTSTRAP` | `runtime.bootstrap` | String |
//! | `RUNPAD_PRELOAD` | `runtime.preload` | bool |
//! | `RUNPAD_TIMEOUT_MS` | `limits.timeout_ms` | u64 |
//! | `RUNPAD_MAX_INSTRUCTIONS` | `limits.max_instructions` | u64 |
//! | `RUNPAD_MAX_OUTPUT_BYTES` | `limits.max_output_bytes` | usize |
//! | `RUNPAD_MAX_MEMORY_BYTES` | `limits.max_memory_bytes` | usize |
//! | `RUNPAD_HISTORY_FILE` | `editor.history_file` | PathBuf |
//! | `RUNPAD_LOG_FILE` | `logging.file` | bool |
//! | `RUNPAD_LOG_DIR` | `logging.file_path` (and `logging.file = true`) | PathBuf |
//!
//! # Example Configuration
//!
//! ```toml
//! # ~/.runpad/config.toml
//! debug = false
//!
//! [runtime]
//! bootstrap = "embedded"
//! fetch_timeout_ms = 30000
//!
//! [limits]
//! timeout_ms = 5000
//! max_instructions = 0
//! max_output_bytes = 65536
//!
//! [editor]
//! download_name = "lua_code.lua"
//!
//! [logging]
//! file = true
//! file_level = "debug"
//! ```

mod error;
mod loader;
mod resolver;
mod types;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use resolver::{ConfigResolver, NoOpResolver};
pub use types::{EditorConfig, LimitsConfig, LoggingConfig, RunpadConfig, RuntimeConfig};

/// Default global config directory.
pub fn default_config_dir() -> std::path::PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".runpad")
}

/// Default global config file path.
pub fn default_config_path() -> std::path::PathBuf {
    default_config_dir().join("config.toml")
}

/// Project config directory name.
pub const PROJECT_CONFIG_DIR: &str = ".runpad";

/// Project config file name.
pub const PROJECT_CONFIG_FILE: &str = "config.toml";
