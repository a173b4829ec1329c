//! Overrides applied after file and env loading.
//!
//! ```text
//! ConfigLoader.load()  →  RunpadConfig (base)
//!                              │
//!                              ▼
//!                     ConfigResolver.apply()
//!                              │
//!                              ▼
//!                     RunpadConfig (final)
//! ```

use super::RunpadConfig;

/// Applies configuration overrides, typically from CLI flags.
pub trait ConfigResolver {
    /// Applies overrides to the given configuration.
    ///
    /// Only values the caller actually specified should be applied.
    fn apply(&self, config: &mut RunpadConfig);
}

/// Resolver that makes no changes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpResolver;

impl ConfigResolver for NoOpResolver {
    fn apply(&self, _config: &mut RunpadConfig) {}
}
