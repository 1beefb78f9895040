//! Process-wide script registry.
//!
//! The registry maps script names to implementations. It is populated by an
//! initialization pass — every handler module registers its scripts before
//! any task runs — and is read-only afterwards, so lookups need no locking.
//!
//! A name that has no family-specific entry falls back to the generic
//! family `"*"`, which hosts handlers shared across device families.

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::error::ScriptError;
use crate::core::types::ScriptName;
use crate::engine::script::Script;

/// Family used for generic, cross-family script entries.
pub const GENERIC_FAMILY: &str = "*";

/// Immutable name → script table.
pub struct ScriptRegistry {
    scripts: HashMap<ScriptName, Arc<dyn Script>>,
}

/// Builder for [`ScriptRegistry`], used during initialization only.
#[derive(Default)]
pub struct ScriptRegistryBuilder {
    scripts: HashMap<ScriptName, Arc<dyn Script>>,
}

impl ScriptRegistryBuilder {
    /// Register a script under its declared name.
    ///
    /// A later registration for the same name replaces the earlier one,
    /// letting family-specific modules override generic entries.
    pub fn register(mut self, script: Arc<dyn Script>) -> Self {
        self.scripts.insert(ScriptName::new(script.name()), script);
        self
    }

    /// Finish initialization; the registry is read-only from here on.
    pub fn build(self) -> ScriptRegistry {
        ScriptRegistry {
            scripts: self.scripts,
        }
    }
}

impl ScriptRegistry {
    /// Start building a registry.
    pub fn builder() -> ScriptRegistryBuilder {
        ScriptRegistryBuilder::default()
    }

    /// Number of registered scripts.
    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    /// Check whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    /// Look up a script by exact name, then by the generic family.
    pub fn resolve(&self, name: &ScriptName) -> Result<Arc<dyn Script>, ScriptError> {
        if let Some(script) = self.scripts.get(name) {
            return Ok(Arc::clone(script));
        }
        let generic = name.with_family(GENERIC_FAMILY);
        if let Some(script) = self.scripts.get(&generic) {
            return Ok(Arc::clone(script));
        }
        Err(ScriptError::Internal(format!(
            "no script registered as {} (or {})",
            name, generic
        )))
    }

    /// Check whether a name resolves, directly or generically.
    pub fn contains(&self, name: &ScriptName) -> bool {
        self.scripts.contains_key(name)
            || self.scripts.contains_key(&name.with_family(GENERIC_FAMILY))
    }
}
