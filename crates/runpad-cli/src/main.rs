//! runpad - terminal Lua playground
//!
//! # Usage
//!
//! ```text
//! runpad                      interactive editor
//! runpad run script.lua       execute a file
//! runpad eval "print(1 + 1)"  execute inline code (`-` reads stdin)
//! runpad examples [NAME]      list or print example programs
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded from multiple sources with priority:
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`RUNPAD_*`)
//! 3. Project config (`.runpad/config.toml` in the project root)
//! 4. Global config (`~/.runpad/config.toml`)
//! 5. Default values (lowest priority)
//!
//! # Exit Codes
//!
//! - `0`: success
//! - `1`: the program failed (or runpad itself did)
//! - `130`: the run was cancelled with Ctrl+C

mod buffer;
mod commands;
mod ctrl_c;
mod printer;
mod repl;
mod tracing_writer;

use anyhow::Result;
use clap::{Parser, Subcommand};
use ctrl_c::CtrlC;
use printer::SharedPrinterSlot;
use runpad_lua::{BootstrapSource, LuaProvider};
use runpad_runtime::config::{ConfigError, ConfigLoader, ConfigResolver, RunpadConfig};
use runpad_runtime::Playground;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// runpad - terminal Lua playground
#[derive(Parser, Debug)]
#[command(name = "runpad")]
#[command(version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Project root directory (defaults to current directory)
    #[arg(short = 'C', long, global = true)]
    project: Option<PathBuf>,

    /// Interpreter bootstrap: `embedded`, a file path, or an http(s) URL
    /// (also: RUNPAD_BOOTSTRAP)
    #[arg(long, value_name = "SOURCE", global = true)]
    bootstrap: Option<String>,

    /// Execution deadline in milliseconds, 0 disables (also: RUNPAD_TIMEOUT_MS)
    #[arg(long, value_name = "MS", global = true)]
    timeout_ms: Option<u64>,

    /// Instruction budget per run, 0 disables (also: RUNPAD_MAX_INSTRUCTIONS)
    #[arg(long, value_name = "N", global = true)]
    max_instructions: Option<u64>,

    /// Captured output cap in bytes, 0 disables (also: RUNPAD_MAX_OUTPUT_BYTES)
    #[arg(long, value_name = "BYTES", global = true)]
    max_output: Option<usize>,

    /// Interpreter memory limit in bytes, 0 disables (also: RUNPAD_MAX_MEMORY_BYTES)
    #[arg(long, value_name = "BYTES", global = true)]
    max_memory: Option<usize>,

    /// Ignore global and project config files
    #[arg(long, global = true)]
    no_config: bool,

    /// Enable file logging into this directory (also: RUNPAD_LOG_DIR)
    #[arg(long, value_name = "PATH", global = true)]
    log_file: Option<PathBuf>,

    /// Override file log level (default: debug)
    #[arg(long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Execute a Lua file
    Run {
        /// Path to the source file
        file: PathBuf,
    },
    /// Execute inline Lua code (`-` reads it from stdin)
    Eval {
        /// Source code
        #[arg(allow_hyphen_values = true)]
        code: String,
    },
    /// List example programs, or print one
    Examples {
        /// Key or title of the example
        name: Option<String>,
    },
}

/// Applies CLI flags as the highest-priority configuration layer.
struct CliConfigResolver {
    project_root: PathBuf,
    no_config: bool,
    debug: bool,
    bootstrap: Option<String>,
    timeout_ms: Option<u64>,
    max_instructions: Option<u64>,
    max_output: Option<usize>,
    max_memory: Option<usize>,
    log_file: Option<PathBuf>,
    log_level: Option<String>,
}

impl CliConfigResolver {
    fn from_args(args: &Args) -> Self {
        let project_root = args.project.clone().unwrap_or_else(|| {
            std::env::current_dir().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to get current directory, using '.'");
                PathBuf::from(".")
            })
        });

        Self {
            project_root,
            no_config: args.no_config,
            debug: args.debug,
            bootstrap: args.bootstrap.clone(),
            timeout_ms: args.timeout_ms,
            max_instructions: args.max_instructions,
            max_output: args.max_output,
            max_memory: args.max_memory,
            log_file: args.log_file.clone(),
            log_level: args.log_level.clone(),
        }
    }

    /// Loads files and environment, then applies the CLI layer.
    fn load(&self) -> Result<RunpadConfig, ConfigError> {
        let mut loader = ConfigLoader::new().with_project_root(self.project_root.clone());
        if self.no_config {
            loader = loader.skip_global_config().skip_project_config();
        }

        let mut config = loader.load()?;
        self.apply(&mut config);
        Ok(config)
    }
}

impl ConfigResolver for CliConfigResolver {
    fn apply(&self, config: &mut RunpadConfig) {
        if self.debug {
            config.debug = true;
        }
        if let Some(ref bootstrap) = self.bootstrap {
            config.runtime.bootstrap.clone_from(bootstrap);
        }
        if let Some(ms) = self.timeout_ms {
            config.limits.timeout_ms = ms;
        }
        if let Some(n) = self.max_instructions {
            config.limits.max_instructions = n;
        }
        if let Some(bytes) = self.max_output {
            config.limits.max_output_bytes = bytes;
        }
        if let Some(bytes) = self.max_memory {
            config.limits.max_memory_bytes = bytes;
        }
        if let Some(ref p) = self.log_file {
            config.logging.file = true;
            config.logging.file_path = Some(p.clone());
        }
        if let Some(ref level) = self.log_level {
            config.logging.file_level.clone_from(level);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Links tracing output to rustyline's ExternalPrinter in the editor
    let printer_slot = SharedPrinterSlot::new();

    let resolver = CliConfigResolver::from_args(&args);
    let config = resolver
        .load()
        .map_err(|e| anyhow::anyhow!("Config error: {e}"))?;

    init_tracing(&config, args.verbose, &printer_slot);

    info!(path = %resolver.project_root.display(), "Project root");
    if config.logging.file {
        info!(
            path = %config.logging.resolved_file_path().join("runpad.log").display(),
            level = %config.logging.file_level,
            "File logging enabled"
        );
    }

    let playground = build_playground(&config);

    let exit_code = match args.command {
        None => {
            repl::Repl::new(playground, &config, printer_slot, CtrlC::install())
                .run()
                .await;
            0
        }
        Some(Command::Run { file }) => {
            commands::run_file(&playground, &file, &CtrlC::install()).await?
        }
        Some(Command::Eval { code }) => {
            commands::eval(&playground, &code, &CtrlC::install()).await?
        }
        Some(Command::Examples { name }) => {
            print!("{}", commands::examples(name.as_deref())?);
            0
        }
    };

    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}

/// Terminal filter: debug > verbose > `RUST_LOG` > `warn`.
/// File filter: `config.logging.file_level`, independent of the terminal.
fn init_tracing(config: &RunpadConfig, verbose: bool, printer_slot: &SharedPrinterSlot) {
    let terminal_filter = if config.debug {
        EnvFilter::new(
            "debug,hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn,rustyline=warn",
        )
    } else if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let terminal_writer = tracing_writer::TerminalMakeWriter::new(printer_slot);
    let terminal_layer = fmt::layer().with_target(false).with_writer(terminal_writer);

    let log_file = if config.logging.file {
        open_log_file(&config.logging.resolved_file_path())
    } else {
        None
    };

    if let Some(file) = log_file {
        let file_filter = EnvFilter::new(config.logging.file_filter_directive());
        let file_layer = fmt::layer()
            .with_target(false)
            .with_ansi(false)
            .with_writer(tracing_writer::FileMakeWriter::new(file));

        tracing_subscriber::registry()
            .with(terminal_layer.with_filter(terminal_filter))
            .with(file_layer.with_filter(file_filter))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(terminal_layer.with_filter(terminal_filter))
            .init();
    }
}

fn build_playground(config: &RunpadConfig) -> Playground {
    let source: BootstrapSource = config.runtime.bootstrap.parse().unwrap_or_default();
    let provider = LuaProvider::new(source)
        .with_memory_limit(config.limits.memory_limit())
        .with_fetch_timeout(config.runtime.fetch_timeout());
    Playground::with_provider(Arc::new(provider), config.limits.execution_limits())
}

/// Opens `<log_dir>/runpad.log` in append mode.
///
/// Returns `None` if the directory or file cannot be created (non-fatal).
fn open_log_file(log_dir: &std::path::Path) -> Option<Arc<parking_lot::Mutex<std::fs::File>>> {
    if let Err(e) = std::fs::create_dir_all(log_dir) {
        eprintln!(
            "Warning: cannot create log directory {}: {e}",
            log_dir.display()
        );
        return None;
    }

    let log_path = log_dir.join("runpad.log");

    match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => Some(Arc::new(parking_lot::Mutex::new(file))),
        Err(e) => {
            eprintln!("Warning: cannot open log file {}: {e}", log_path.display());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runpad_runtime::LoadState;
    use std::time::Duration;
    use tempfile::TempDir;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("runpad").chain(argv.iter().copied()))
            .expect("args should parse")
    }

    /// Resolver rooted in an empty temp project with config files skipped.
    fn resolver_with(argv: &[&str]) -> (TempDir, CliConfigResolver) {
        let temp = TempDir::new().expect("temp project");
        let mut resolver = CliConfigResolver::from_args(&parse(argv));
        resolver.project_root = temp.path().to_path_buf();
        resolver.no_config = true;
        (temp, resolver)
    }

    #[test]
    fn no_subcommand_means_editor() {
        let args = parse(&[]);
        assert!(args.command.is_none());
        assert!(!args.debug);
    }

    #[test]
    fn subcommands_parse() {
        assert_eq!(
            parse(&["run", "demo.lua"]).command,
            Some(Command::Run {
                file: PathBuf::from("demo.lua")
            })
        );
        assert_eq!(
            parse(&["eval", "-"]).command,
            Some(Command::Eval { code: "-".into() })
        );
        assert_eq!(
            parse(&["eval", "-- comment only"]).command,
            Some(Command::Eval {
                code: "-- comment only".into()
            })
        );
        assert_eq!(
            parse(&["examples"]).command,
            Some(Command::Examples { name: None })
        );
    }

    #[test]
    fn global_flags_after_subcommand() {
        let args = parse(&["eval", "print(1)", "--timeout-ms", "250", "-d"]);
        assert_eq!(args.timeout_ms, Some(250));
        assert!(args.debug);
    }

    #[test]
    fn from_args_defaults_project_to_cwd() {
        let resolver = CliConfigResolver::from_args(&parse(&[]));
        assert!(resolver.project_root.exists());
        assert!(!resolver.no_config);
        assert!(resolver.bootstrap.is_none());
    }

    #[test]
    fn apply_without_flags_changes_nothing() {
        let (_temp, resolver) = resolver_with(&[]);
        let mut config = RunpadConfig::default();
        resolver.apply(&mut config);
        assert_eq!(config, RunpadConfig::default());
    }

    #[test]
    fn apply_overrides_limits_and_bootstrap() {
        let (_temp, resolver) = resolver_with(&[
            "--bootstrap",
            "/opt/prelude.lua",
            "--timeout-ms",
            "0",
            "--max-instructions",
            "5000",
            "--max-output",
            "128",
            "--max-memory",
            "1048576",
        ]);
        let mut config = RunpadConfig::default();
        resolver.apply(&mut config);

        assert_eq!(config.runtime.bootstrap, "/opt/prelude.lua");
        assert_eq!(config.limits.timeout_ms, 0);
        assert_eq!(config.limits.max_instructions, 5_000);
        assert_eq!(config.limits.max_output_bytes, 128);
        assert_eq!(config.limits.max_memory_bytes, 1 << 20);

        let limits = config.limits.execution_limits();
        assert_eq!(limits.timeout, None);
        assert_eq!(limits.max_instructions, Some(5_000));
    }

    #[test]
    fn log_file_flag_enables_file_logging() {
        let (_temp, resolver) =
            resolver_with(&["--log-file", "/tmp/runpad-logs", "--log-level", "trace"]);
        let mut config = RunpadConfig::default();
        resolver.apply(&mut config);

        assert!(config.logging.file);
        assert_eq!(
            config.logging.file_path,
            Some(PathBuf::from("/tmp/runpad-logs"))
        );
        assert_eq!(config.logging.file_level, "trace");
    }

    #[test]
    fn cli_layer_wins_over_project_config() {
        let temp = TempDir::new().expect("temp project");
        let dir = temp.path().join(".runpad");
        std::fs::create_dir_all(&dir).expect("config dir");
        std::fs::write(
            dir.join("config.toml"),
            "[limits]\ntimeout_ms = 1000\nmax_output_bytes = 2048\n",
        )
        .expect("write config");

        let mut resolver = CliConfigResolver::from_args(&parse(&["--timeout-ms", "250"]));
        resolver.project_root = temp.path().to_path_buf();
        let config = ConfigLoader::new()
            .with_project_root(temp.path())
            .skip_global_config()
            .skip_env_vars()
            .load()
            .map(|mut config| {
                resolver.apply(&mut config);
                config
            })
            .expect("load");

        assert_eq!(config.limits.timeout_ms, 250);
        assert_eq!(config.limits.max_output_bytes, 2048);
    }

    #[test]
    fn no_config_skips_project_file() {
        let (temp, resolver) = resolver_with(&[]);
        let dir = temp.path().join(".runpad");
        std::fs::create_dir_all(&dir).expect("config dir");
        std::fs::write(dir.join("config.toml"), "debug = true\n").expect("write config");

        let config = resolver.load().expect("load");
        assert!(!config.debug);
    }

    #[tokio::test]
    async fn build_playground_uses_configured_limits() {
        let mut config = RunpadConfig::default();
        config.limits.timeout_ms = 100;

        let playground = build_playground(&config);
        assert_eq!(
            playground.engine().limits().timeout,
            Some(Duration::from_millis(100))
        );
        assert_eq!(playground.state(), LoadState::Unloaded);

        let result = playground.execute_code("print('configured')").await;
        assert_eq!(result.output(), "configured\n");
    }
}
