//! Sandboxed Lua 5.4 runtime for runpad.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ LuaProvider (RuntimeProvider)                │
//! │   BootstrapSource: embedded | file | URL     │
//! │        │ inject_bootstrap()                  │
//! │        ▼                                     │
//! │ FactoryRegistry ◀── LuaFactory (prelude)     │
//! │                        │ instantiate()       │
//! │                        ▼                     │
//! │                    LuaRuntime (Runtime)      │
//! │                      mlua::Lua + hook        │
//! │                      print / io.write ──▶ OutputChannel
//! └──────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use runpad_lua::{BootstrapSource, LuaProvider};
//! use runpad_runtime::{ExecutionLimits, Playground};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let provider = LuaProvider::new(BootstrapSource::Embedded);
//! let playground = Playground::with_provider(Arc::new(provider), ExecutionLimits::default());
//! let result = playground.execute_code("print(inspect({1, 2, 3}))").await;
//! assert_eq!(result.output(), "{1, 2, 3}\n");
//! # }
//! ```

pub mod embedded;
mod error;
mod hook;
mod provider;
mod runtime;
mod sandbox;
pub mod snippets;

pub use error::LuaError;
pub use provider::{BootstrapSource, LuaFactory, LuaProvider, DEFAULT_FETCH_TIMEOUT};
pub use hook::HOOK_INTERVAL;
pub use runtime::LuaRuntime;
pub use snippets::Snippet;
