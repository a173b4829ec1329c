//! Configuration loader with hierarchical merging.
//!
//! # Load Order
//!
//! 1. Default values (compile-time)
//! 2. Global config (`~/.runpad/config.toml`)
//! 3. Project config (`.runpad/config.toml`)
//! 4. Environment variables (`RUNPAD_*`)
//!
//! Each layer overrides the previous.

use super::{
    default_config_path, ConfigError, RunpadConfig, PROJECT_CONFIG_DIR, PROJECT_CONFIG_FILE,
};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

macro_rules! parse_env_bool {
    ($field:expr, $var:literal) => {
        if let Ok(val) = std::env::var($var) {
            $field = parse_bool(&val)
                .ok_or_else(|| ConfigError::invalid_env_var($var, "expected bool"))?;
        }
    };
}

macro_rules! parse_env_num {
    ($field:expr, $var:literal) => {
        if let Ok(val) = std::env::var($var) {
            $field = parse_num(&val)
                .ok_or_else(|| ConfigError::invalid_env_var($var, "expected integer"))?;
        }
    };
}

/// Configuration loader with builder pattern.
///
/// # Example
///
/// ```no_run
/// use runpad_runtime::config::ConfigLoader;
///
/// let config = ConfigLoader::new()
///     .with_project_root(".")
///     .load()?;
/// # Ok::<(), runpad_runtime::config::ConfigError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    /// Global config file path (defaults to `~/.runpad/config.toml`).
    global_config_path: Option<PathBuf>,

    /// Project root directory.
    project_root: Option<PathBuf>,

    skip_env: bool,
    skip_global: bool,
    skip_project: bool,
}

impl ConfigLoader {
    /// Creates a new loader with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a custom global config path.
    #[must_use]
    pub fn with_global_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_config_path = Some(path.into());
        self
    }

    /// Sets the project root directory.
    ///
    /// Project config is loaded from `<project_root>/.runpad/config.toml`.
    #[must_use]
    pub fn with_project_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.project_root = Some(path.into());
        self
    }

    /// Skips environment variable loading.
    #[must_use]
    pub fn skip_env_vars(mut self) -> Self {
        self.skip_env = true;
        self
    }

    /// Skips global config loading.
    #[must_use]
    pub fn skip_global_config(mut self) -> Self {
        self.skip_global = true;
        self
    }

    /// Skips project config loading.
    #[must_use]
    pub fn skip_project_config(mut self) -> Self {
        self.skip_project = true;
        self
    }

    /// Loads and merges configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a config file exists but cannot be read or
    /// parsed, or an env var holds an invalid value. Missing files are
    /// ignored.
    pub fn load(&self) -> Result<RunpadConfig, ConfigError> {
        let mut config = RunpadConfig::default();

        if !self.skip_global {
            let global_path = self
                .global_config_path
                .clone()
                .unwrap_or_else(default_config_path);

            if let Some(global_config) = load_file(&global_path)? {
                debug!(path = %global_path.display(), "Loaded global config");
                config.merge(&global_config);
            }
        }

        if !self.skip_project {
            if let Some(ref project_root) = self.project_root {
                let project_config_path = project_root
                    .join(PROJECT_CONFIG_DIR)
                    .join(PROJECT_CONFIG_FILE);

                if let Some(project_config) = load_file(&project_config_path)? {
                    debug!(
                        path = %project_config_path.display(),
                        project = %project_root.display(),
                        "Loaded project config"
                    );
                    config.merge(&project_config);
                }
            }
        }

        if !self.skip_env {
            apply_env_vars(&mut config)?;
        }

        Ok(config)
    }
}

/// Loads a config file, returning `None` if it doesn't exist.
fn load_file(path: &Path) -> Result<Option<RunpadConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
    let config =
        RunpadConfig::from_toml(&content).map_err(|e| ConfigError::parse_toml(path, e))?;

    Ok(Some(config))
}

fn apply_env_vars(config: &mut RunpadConfig) -> Result<(), ConfigError> {
    parse_env_bool!(config.debug, "RUNPAD_DEBUG");
    parse_env_bool!(config.runtime.preload, "RUNPAD_PRELOAD");
    parse_env_bool!(config.logging.file, "RUNPAD_LOG_FILE");

    parse_env_num!(config.limits.timeout_ms, "RUNPAD_TIMEOUT_MS");
    parse_env_num!(config.limits.max_instructions, "RUNPAD_MAX_INSTRUCTIONS");
    parse_env_num!(config.limits.max_output_bytes, "RUNPAD_MAX_OUTPUT_BYTES");
    parse_env_num!(config.limits.max_memory_bytes, "RUNPAD_MAX_MEMORY_BYTES");

    if let Ok(val) = std::env::var("RUNPAD_BOOTSTRAP") {
        config.runtime.bootstrap = val;
    }
    if let Ok(val) = std::env::var("RUNPAD_LOG_DIR") {
        config.logging.file = true;
        config.logging.file_path = Some(PathBuf::from(val));
    }
    if let Ok(val) = std::env::var("RUNPAD_HISTORY_FILE") {
        config.editor.history_file = Some(PathBuf::from(val));
    }

    Ok(())
}

/// Parses a boolean from string.
///
/// Accepts: "true", "false", "1", "0", "yes", "no", "on", "off"
/// (case-insensitive).
fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_num<T: FromStr>(s: &str) -> Option<T> {
    s.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_config_file(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn load_defaults_only() {
        let config = ConfigLoader::new()
            .skip_global_config()
            .skip_project_config()
            .skip_env_vars()
            .load()
            .unwrap();

        assert_eq!(config, RunpadConfig::default());
    }

    #[test]
    fn load_global_config() {
        let temp = TempDir::new().unwrap();
        let config_path = create_config_file(
            temp.path(),
            r#"
debug = true

[limits]
timeout_ms = 1500
"#,
        );

        let config = ConfigLoader::new()
            .with_global_config(&config_path)
            .skip_project_config()
            .skip_env_vars()
            .load()
            .unwrap();

        assert!(config.debug);
        assert_eq!(config.limits.timeout_ms, 1500);
    }

    #[test]
    fn load_project_overrides_global() {
        let global_temp = TempDir::new().unwrap();
        let project_temp = TempDir::new().unwrap();

        let runpad_dir = project_temp.path().join(".runpad");
        std::fs::create_dir_all(&runpad_dir).unwrap();

        let global_path = create_config_file(
            global_temp.path(),
            r#"
debug = true

[runtime]
bootstrap = "/global/prelude.lua"
"#,
        );

        create_config_file(
            &runpad_dir,
            r#"
[runtime]
bootstrap = "https://example.invalid/prelude.lua"
"#,
        );

        let config = ConfigLoader::new()
            .with_global_config(&global_path)
            .with_project_root(project_temp.path())
            .skip_env_vars()
            .load()
            .unwrap();

        assert!(config.debug);
        assert_eq!(
            config.runtime.bootstrap,
            "https://example.invalid/prelude.lua"
        );
    }

    #[test]
    fn missing_config_files_ok() {
        let config = ConfigLoader::new()
            .with_global_config("/nonexistent/path/config.toml")
            .with_project_root("/nonexistent/project")
            .skip_env_vars()
            .load()
            .unwrap();

        assert_eq!(config, RunpadConfig::default());
    }

    #[test]
    fn malformed_config_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = create_config_file(temp.path(), "debug = \"maybe\"\n[limits\n");

        let err = ConfigLoader::new()
            .with_global_config(&path)
            .skip_project_config()
            .skip_env_vars()
            .load()
            .unwrap_err();

        assert!(matches!(err, ConfigError::ParseToml { .. }));
    }

    #[test]
    fn parse_bool_values() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("yes"), Some(true));
        assert_eq!(parse_bool("on"), Some(true));

        assert_eq!(parse_bool("false"), Some(false));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("no"), Some(false));
        assert_eq!(parse_bool("off"), Some(false));

        assert_eq!(parse_bool("invalid"), None);
    }

    #[test]
    fn parse_num_values() {
        assert_eq!(parse_num::<u64>(" 250 "), Some(250));
        assert_eq!(parse_num::<u64>("-1"), None);
        assert_eq!(parse_num::<usize>("lots"), None);
    }

    #[test]
    fn env_var_override() {
        // Only this test touches RUNPAD_* variables.
        std::env::set_var("RUNPAD_DEBUG", "yes");
        std::env::set_var("RUNPAD_TIMEOUT_MS", "750");
        std::env::set_var("RUNPAD_BOOTSTRAP", "/tmp/prelude.lua");
        std::env::set_var("RUNPAD_LOG_DIR", "/tmp/runpad-logs");

        let loaded = ConfigLoader::new()
            .skip_global_config()
            .skip_project_config()
            .load();

        std::env::set_var("RUNPAD_TIMEOUT_MS", "soon");
        let invalid = ConfigLoader::new()
            .skip_global_config()
            .skip_project_config()
            .load();

        std::env::remove_var("RUNPAD_DEBUG");
        std::env::remove_var("RUNPAD_TIMEOUT_MS");
        std::env::remove_var("RUNPAD_BOOTSTRAP");
        std::env::remove_var("RUNPAD_LOG_DIR");

        let config = loaded.unwrap();
        assert!(config.debug);
        assert_eq!(config.limits.timeout_ms, 750);
        assert_eq!(config.runtime.bootstrap, "/tmp/prelude.lua");
        assert!(config.logging.file);
        assert_eq!(
            config.logging.file_path,
            Some(PathBuf::from("/tmp/runpad-logs"))
        );

        assert!(matches!(
            invalid.unwrap_err(),
            ConfigError::InvalidEnvVar { ref name, .. } if name == "RUNPAD_TIMEOUT_MS"
        ));
    }
}
