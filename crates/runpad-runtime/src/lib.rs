//! Interpreter lifecycle and code-execution core.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      Playground                          │
//! │  execute_code(source) ─────────────► ExecutionResult     │
//! │        │                                                 │
//! │        ▼                                                 │
//! │  ┌──────────────────┐   acquire()   ┌─────────────────┐  │
//! │  │  RuntimeLoader   │ ◄──────────── │ ExecutionEngine │  │
//! │  │  (single-flight) │ ────────────► │ (blocking pool) │  │
//! │  └──────────────────┘ RuntimeHandle └─────────────────┘  │
//! │        │                                     │           │
//! │        ▼                                     ▼           │
//! │  RuntimeProvider ──► RuntimeFactory ──► dyn Runtime      │
//! │  (inject bootstrap)  (FactoryRegistry)  + OutputChannel  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! The loader starts at most one bootstrap at a time, shares its outcome
//! with every concurrent caller and retries on the next call after a
//! failure. The engine captures output per run and turns every fault,
//! timeout, cancellation or panic into a [`ExecutionResult::Failure`].
//!
//! # Example
//!
//! ```
//! use runpad_runtime::testing::FakeProvider;
//! use runpad_runtime::{ExecutionLimits, ExecutionResult, Playground};
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let (provider, _factory) = FakeProvider::new();
//! let playground = Playground::with_provider(Arc::new(provider), ExecutionLimits::default());
//!
//! let result = playground.execute_code("print('Hello, World!')").await;
//! assert_eq!(result, ExecutionResult::success("Hello, World!\n"));
//! # }
//! ```

pub mod config;
mod engine;
mod error;
mod handle;
mod loader;
mod output;
mod playground;
mod provider;
pub mod testing;
mod util;

pub use engine::{
    ExecutionEngine, ExecutionLimits, ExecutionResult, FailureKind, DEFAULT_MAX_OUTPUT_BYTES,
    DEFAULT_TIMEOUT, GENERIC_FAILURE_MESSAGE,
};
pub use error::{BootstrapError, LoadError};
pub use handle::{Interrupt, InterruptReason, Runtime, RuntimeFault, RuntimeHandle};
pub use loader::{LoadState, RuntimeLoader};
pub use output::OutputChannel;
pub use playground::Playground;
pub use provider::{FactoryRegistry, RuntimeFactory, RuntimeProvider};
