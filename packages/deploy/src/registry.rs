//! String-keyed table of available deployers.
//!
//! Each backend contributes its [`DeployerDefinition`] and a factory that
//! builds it from a [`DeployParams`] map. The host looks backends up by the
//! definition's `id`.

use std::collections::BTreeMap;

use crate::{DeployError, DeployParams, Deployer, DeployerDefinition};

/// Builds a deployer from its configuration.
pub type DeployerFactory = fn(&DeployParams) -> Result<Box<dyn Deployer>, DeployError>;

struct Entry {
    definition: &'static DeployerDefinition,
    factory: DeployerFactory,
}

/// Registered deployers, keyed by definition id.
#[derive(Default)]
pub struct DeployerRegistry {
    entries: BTreeMap<&'static str, Entry>,
}

impl DeployerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a deployer under `definition.id`, replacing any earlier
    /// registration with the same id.
    pub fn register(&mut self, definition: &'static DeployerDefinition, factory: DeployerFactory) {
        let previous = self
            .entries
            .insert(definition.id, Entry { definition, factory });
        if previous.is_some() {
            log::warn!("Deployer '{}' registered twice, keeping the latest", definition.id);
        }
    }

    /// Returns every registered definition, sorted by id.
    #[must_use]
    pub fn definitions(&self) -> Vec<&'static DeployerDefinition> {
        self.entries.values().map(|e| e.definition).collect()
    }

    /// Looks up the definition registered under `id`.
    #[must_use]
    pub fn definition(&self, id: &str) -> Option<&'static DeployerDefinition> {
        self.entries.get(id).map(|e| e.definition)
    }

    /// Constructs the deployer registered under `id` from `params`.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::UnknownDeployer`] if nothing is registered
    /// under `id`, or whatever the deployer's factory rejects.
    pub fn create(&self, id: &str, params: &DeployParams) -> Result<Box<dyn Deployer>, DeployError> {
        let entry = self.entries.get(id).ok_or_else(|| DeployError::UnknownDeployer {
            id: id.to_string(),
        })?;
        (entry.factory)(params)
    }
}

impl std::fmt::Debug for DeployerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.entries.keys()).finish()
    }
}
