//! Bootstrap provider and factory for the Lua runtime.
//!
//! ```text
//! LuaProvider::inject_bootstrap()
//!   1. read artifact   (embedded | file | http(s) URL)
//!   2. compile check   (scratch VM, not executed)
//!   3. register        LuaFactory ──▶ FactoryRegistry
//!
//! LuaFactory::instantiate()           (blocking thread)
//!   sandboxed VM + memory limit + run prelude ──▶ LuaRuntime
//! ```
//!
//! The fetch timeout also bounds how long the prelude may run, so a prelude
//! that never returns fails instantiation instead of stalling the loader.

use crate::embedded::{PRELUDE, PRELUDE_NAME};
use crate::error::LuaError;
use crate::runtime::LuaRuntime;
use async_trait::async_trait;
use mlua::Lua;
use runpad_runtime::{
    BootstrapError, FactoryRegistry, Interrupt, Runtime, RuntimeFactory, RuntimeProvider,
};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Default timeout for fetching a remote artifact.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Where the bootstrap prelude comes from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BootstrapSource {
    /// The prelude compiled into the binary.
    #[default]
    Embedded,
    /// A Lua file on disk.
    File(PathBuf),
    /// A Lua file fetched over HTTP(S).
    Url(String),
}

impl BootstrapSource {
    /// Human-readable location, used in errors and logs.
    #[must_use]
    pub fn location(&self) -> String {
        self.to_string()
    }

    /// Reads the artifact text.
    ///
    /// # Errors
    ///
    /// Returns [`LuaError::Fetch`] if the file cannot be read or the
    /// request fails or returns a non-success status.
    pub async fn read(&self, fetch_timeout: Duration) -> Result<String, LuaError> {
        match self {
            Self::Embedded => Ok(PRELUDE.to_string()),
            Self::File(path) => tokio::fs::read_to_string(path)
                .await
                .map_err(|e| LuaError::fetch(path.display().to_string(), e)),
            Self::Url(url) => fetch(url, fetch_timeout).await,
        }
    }

    fn chunk_name(&self) -> String {
        match self {
            Self::Embedded => PRELUDE_NAME.to_string(),
            Self::File(path) => format!("@{}", path.display()),
            Self::Url(url) => format!("@{url}"),
        }
    }
}

impl FromStr for BootstrapSource {
    type Err = std::convert::Infallible;

    /// `embedded` → [`Embedded`](Self::Embedded), `http://` or `https://`
    /// → [`Url`](Self::Url), anything else → [`File`](Self::File).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Ok(if s.is_empty() || s.eq_ignore_ascii_case("embedded") {
            Self::Embedded
        } else if s.starts_with("http://") || s.starts_with("https://") {
            Self::Url(s.to_string())
        } else {
            Self::File(PathBuf::from(s))
        })
    }
}

impl fmt::Display for BootstrapSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Embedded => f.write_str("embedded"),
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Url(url) => f.write_str(url),
        }
    }
}

async fn fetch(url: &str, timeout: Duration) -> Result<String, LuaError> {
    debug!(url, timeout_ms = timeout.as_millis() as u64, "Fetching bootstrap artifact");
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| LuaError::fetch(url, e))?;
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| LuaError::fetch(url, e))?
        .error_for_status()
        .map_err(|e| LuaError::fetch(url, e))?;
    response.text().await.map_err(|e| LuaError::fetch(url, e))
}

/// [`RuntimeProvider`] that loads a Lua prelude and registers a
/// [`LuaFactory`] in its [`FactoryRegistry`].
#[derive(Debug, Clone)]
pub struct LuaProvider {
    source: BootstrapSource,
    registry: FactoryRegistry,
    memory_limit: Option<usize>,
    fetch_timeout: Duration,
}

impl LuaProvider {
    /// Creates a provider for `source` with a private registry.
    #[must_use]
    pub fn new(source: BootstrapSource) -> Self {
        Self {
            source,
            registry: FactoryRegistry::new(),
            memory_limit: None,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    /// Uses a shared host registry.
    #[must_use]
    pub fn with_registry(mut self, registry: FactoryRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Caps each VM's heap.
    #[must_use]
    pub fn with_memory_limit(mut self, limit: Option<usize>) -> Self {
        self.memory_limit = limit;
        self
    }

    /// Sets the timeout for remote artifacts and for running the prelude.
    #[must_use]
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// The configured source.
    #[must_use]
    pub fn source(&self) -> &BootstrapSource {
        &self.source
    }

    /// The host registry.
    #[must_use]
    pub fn registry(&self) -> &FactoryRegistry {
        &self.registry
    }

    async fn load_factory(&self) -> Result<LuaFactory, LuaError> {
        let location = self.source.location();
        let prelude = self.source.read(self.fetch_timeout).await?;
        validate(&prelude, &self.source.chunk_name()).map_err(|reason| {
            LuaError::InvalidScript {
                location: location.clone(),
                reason,
            }
        })?;
        Ok(LuaFactory {
            prelude: Arc::from(prelude),
            chunk_name: self.source.chunk_name(),
            memory_limit: self.memory_limit,
            prelude_timeout: self.fetch_timeout,
        })
    }
}

#[async_trait]
impl RuntimeProvider for LuaProvider {
    fn registered_factory(&self) -> Option<Arc<dyn RuntimeFactory>> {
        self.registry.get()
    }

    async fn inject_bootstrap(&self) -> Result<Arc<dyn RuntimeFactory>, BootstrapError> {
        let factory: Arc<dyn RuntimeFactory> = Arc::new(self.load_factory().await?);
        self.registry.register(Arc::clone(&factory));
        info!(source = %self.source, "Lua bootstrap registered");
        Ok(factory)
    }
}

/// Compiles without running.
fn validate(source: &str, chunk_name: &str) -> Result<(), String> {
    let lua = Lua::new();
    lua.load(source)
        .set_name(chunk_name)
        .into_function()
        .map(|_| ())
        .map_err(|e| match e {
            mlua::Error::SyntaxError { message, .. } => message,
            other => other.to_string(),
        })
}

/// Creates sandboxed [`LuaRuntime`]s running a fixed prelude.
#[derive(Debug, Clone)]
pub struct LuaFactory {
    prelude: Arc<str>,
    chunk_name: String,
    memory_limit: Option<usize>,
    prelude_timeout: Duration,
}

impl LuaFactory {
    /// Factory for the embedded prelude.
    #[must_use]
    pub fn embedded(memory_limit: Option<usize>) -> Self {
        Self {
            prelude: Arc::from(PRELUDE),
            chunk_name: PRELUDE_NAME.to_string(),
            memory_limit,
            prelude_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    /// Builds a runtime on the calling thread.
    ///
    /// # Errors
    ///
    /// Returns error if the VM cannot be created, or the prelude raises or
    /// runs past the prelude timeout.
    pub fn build(&self) -> Result<LuaRuntime, LuaError> {
        let runtime = LuaRuntime::new(self.memory_limit)?;
        let interrupt = Interrupt::default().with_timeout(self.prelude_timeout);
        runtime.run_prelude(&self.chunk_name, &self.prelude, &interrupt)?;
        Ok(runtime)
    }
}

#[async_trait]
impl RuntimeFactory for LuaFactory {
    async fn instantiate(&self) -> Result<Box<dyn Runtime>, BootstrapError> {
        let factory = self.clone();
        let runtime = tokio::task::spawn_blocking(move || factory.build())
            .await
            .map_err(|e| {
                BootstrapError::Instantiation(format!("runtime construction failed: {e}"))
            })??;
        debug!(memory = runtime.used_memory(), "Lua runtime instantiated");
        Ok(Box::new(runtime))
    }
}
