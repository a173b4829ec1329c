//! Runtime provisioning capabilities.
//!
//! The loader never reaches for an ambient global. Instead it is given a
//! [`RuntimeProvider`] which knows how to find (or bootstrap) a
//! [`RuntimeFactory`]. The [`FactoryRegistry`] plays the role of the host
//! environment: a bootstrap artifact registers its factory there, and later
//! lookups find it without re-fetching anything.

use crate::error::BootstrapError;
use crate::handle::Runtime;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;

/// Creates runtime instances.
#[async_trait]
pub trait RuntimeFactory: Send + Sync {
    /// Creates a new runtime instance.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError`] if instantiation raises.
    async fn instantiate(&self) -> Result<Box<dyn Runtime>, BootstrapError>;
}

/// Supplies a [`RuntimeFactory`] to the loader.
#[async_trait]
pub trait RuntimeProvider: Send + Sync {
    /// Returns the factory if the host already has one registered.
    fn registered_factory(&self) -> Option<Arc<dyn RuntimeFactory>>;

    /// Loads the bootstrap artifact and returns the factory it registered.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError`] if the artifact is unreachable, invalid,
    /// or registers no factory.
    async fn inject_bootstrap(&self) -> Result<Arc<dyn RuntimeFactory>, BootstrapError>;
}

/// Process-local slot where a bootstrap artifact registers its factory.
#[derive(Clone, Default)]
pub struct FactoryRegistry {
    slot: Arc<RwLock<Option<Arc<dyn RuntimeFactory>>>>,
}

impl FactoryRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the factory.
    pub fn register(&self, factory: Arc<dyn RuntimeFactory>) {
        *self.slot.write() = Some(factory);
    }

    /// Returns the registered factory, if any.
    #[must_use]
    pub fn get(&self) -> Option<Arc<dyn RuntimeFactory>> {
        self.slot.read().clone()
    }

    /// Returns `true` if a factory is registered.
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.slot.read().is_some()
    }

    /// Removes the registered factory.
    pub fn clear(&self) {
        *self.slot.write() = None;
    }
}

impl std::fmt::Debug for FactoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactoryRegistry")
            .field("registered", &self.is_registered())
            .finish()
    }
}
