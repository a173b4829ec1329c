//! Error types for the Lua runtime.

use runpad_runtime::BootstrapError;
use thiserror::Error;

/// Errors raised while building or bootstrapping a Lua VM.
#[derive(Debug, Error)]
pub enum LuaError {
    /// Lua runtime error.
    #[error("lua error: {0}")]
    Runtime(#[from] mlua::Error),

    /// Prelude failed to run in a fresh VM.
    #[error("prelude failed: {0}")]
    Prelude(String),

    /// Bootstrap artifact could not be read or fetched.
    #[error("cannot load '{location}': {reason}")]
    Fetch { location: String, reason: String },

    /// Bootstrap artifact is not valid Lua.
    #[error("invalid script '{location}': {reason}")]
    InvalidScript { location: String, reason: String },
}

impl LuaError {
    /// Creates a fetch error.
    pub fn fetch(location: impl Into<String>, reason: impl ToString) -> Self {
        Self::Fetch {
            location: location.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<LuaError> for BootstrapError {
    fn from(err: LuaError) -> Self {
        match err {
            LuaError::Fetch { location, reason } => {
                BootstrapError::Unreachable { location, reason }
            }
            LuaError::InvalidScript { location, reason } => {
                BootstrapError::Invalid { location, reason }
            }
            other => BootstrapError::Instantiation(other.to_string()),
        }
    }
}
