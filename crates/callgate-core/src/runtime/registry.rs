// crates/callgate-core/src/runtime/registry.rs
// ============================================================================
// Module: Callable Registry
// Description: Construct-then-freeze table of callable classes.
// Purpose: Resolve class and method names to descriptors without locking.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Hosts register every callable class on a [`CallableRegistryBuilder`]
//! during startup and then freeze it. The frozen [`CallableRegistry`] is an
//! immutable, cheaply cloned table that concurrent dispatches read without
//! synchronization.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::core::descriptor::CallableClass;
use crate::core::descriptor::CallableMethod;
use crate::core::descriptor::RegistryError;
use crate::core::identifiers::CallTarget;
use crate::core::identifiers::ClassName;
use crate::core::route::ROUTE_SEPARATOR;

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Mutable registry used during startup.
#[derive(Debug, Default)]
pub struct CallableRegistryBuilder {
    /// Registered classes keyed by name.
    classes: BTreeMap<ClassName, CallableClass>,
}

impl CallableRegistryBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callable class.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the class name is invalid or already taken.
    pub fn register_callable(&mut self, class: CallableClass) -> Result<(), RegistryError> {
        let name = class.name().as_str();
        if name.trim().is_empty() || name.contains(ROUTE_SEPARATOR) {
            return Err(RegistryError::InvalidName(name.to_string()));
        }
        if let Some(method) = class.methods().find(|method| method.name().as_str().is_empty()) {
            return Err(RegistryError::InvalidName(format!("{name}.{}", method.name())));
        }
        if self.classes.contains_key(class.name()) {
            return Err(RegistryError::DuplicateClass(class.name().clone()));
        }
        self.classes.insert(class.name().clone(), class);
        Ok(())
    }

    /// Freezes the builder into an immutable registry.
    #[must_use]
    pub fn freeze(self) -> CallableRegistry {
        CallableRegistry {
            classes: Arc::new(self.classes),
        }
    }
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Immutable, shareable callable table.
#[derive(Debug, Clone, Default)]
pub struct CallableRegistry {
    /// Frozen classes keyed by name.
    classes: Arc<BTreeMap<ClassName, CallableClass>>,
}

impl CallableRegistry {
    /// Returns a builder for a new registry.
    #[must_use]
    pub fn builder() -> CallableRegistryBuilder {
        CallableRegistryBuilder::new()
    }

    /// Looks up a class by name.
    #[must_use]
    pub fn get(&self, class: &str) -> Option<&CallableClass> {
        self.classes.get(class)
    }

    /// Returns true when the class is registered.
    #[must_use]
    pub fn contains(&self, class: &str) -> bool {
        self.classes.contains_key(class)
    }

    /// Resolves a call target to its class and method descriptors.
    #[must_use]
    pub fn resolve(&self, target: &CallTarget) -> Option<(&CallableClass, &CallableMethod)> {
        let class = self.classes.get(target.class.as_str())?;
        let method = class.method(target.method.as_str())?;
        Some((class, method))
    }

    /// Iterates over registered class names in order.
    pub fn class_names(&self) -> impl Iterator<Item = &ClassName> {
        self.classes.keys()
    }

    /// Returns the number of registered classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Returns true when no class is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
