//! Schema registry: per-type descriptors looked up by resource type name.
//!
//! One generic engine consumes these descriptors; there is no per-type code.

use indexmap::IndexMap;

use crate::error::ConfigurationError;
use crate::schema::types::{RelationshipDeclaration, ResourceTypeDescriptor};

/// Registry of resource type descriptors
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    descriptors: IndexMap<String, ResourceTypeDescriptor>,
}

impl SchemaRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from descriptors, registering each in order
    pub fn from_descriptors(
        descriptors: impl IntoIterator<Item = ResourceTypeDescriptor>,
    ) -> Result<Self, ConfigurationError> {
        let mut registry = Self::new();
        for descriptor in descriptors {
            registry.register_descriptor(descriptor)?;
        }
        Ok(registry)
    }

    /// Register a descriptor under `type_name`.
    ///
    /// Registering an identical descriptor twice is a no-op; a different
    /// descriptor under an existing name fails with
    /// [`ConfigurationError::ConflictingDescriptor`].
    pub fn register(
        &mut self,
        type_name: impl Into<String>,
        descriptor: ResourceTypeDescriptor,
    ) -> Result<(), ConfigurationError> {
        let type_name = type_name.into();

        if descriptor.name() != type_name {
            return Err(ConfigurationError::InvalidDescriptor {
                resource_type: type_name,
                reason: format!("descriptor is named '{}'", descriptor.name()),
            });
        }

        if let Some(existing) = self.descriptors.get(&type_name) {
            if existing == &descriptor {
                return Ok(());
            }
            return Err(ConfigurationError::ConflictingDescriptor(type_name));
        }

        descriptor.validate()?;
        self.descriptors.insert(type_name, descriptor);
        Ok(())
    }

    /// Register a descriptor under its own name
    pub fn register_descriptor(
        &mut self,
        descriptor: ResourceTypeDescriptor,
    ) -> Result<(), ConfigurationError> {
        let type_name = descriptor.name().to_string();
        self.register(type_name, descriptor)
    }

    /// Look up a descriptor.
    ///
    /// An unregistered type is a configuration error, not bad input data.
    pub fn lookup(&self, type_name: &str) -> Result<&ResourceTypeDescriptor, ConfigurationError> {
        self.descriptors
            .get(type_name)
            .ok_or_else(|| ConfigurationError::UnknownResourceType(type_name.to_string()))
    }

    pub fn get(&self, type_name: &str) -> Option<&ResourceTypeDescriptor> {
        self.descriptors.get(type_name)
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.descriptors.contains_key(type_name)
    }

    /// Registered type names, in registration order
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.descriptors.keys().map(|s| s.as_str())
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ResourceTypeDescriptor> {
        self.descriptors.values()
    }

    /// Relationship declarations whose child is `child_type`
    pub fn declarations_for<'a>(
        &'a self,
        child_type: &'a str,
    ) -> impl Iterator<Item = &'a RelationshipDeclaration> + 'a {
        self.descriptors
            .get(child_type)
            .map(|d| d.relationships())
            .unwrap_or_default()
            .iter()
            .filter(move |declaration| declaration.child_type == child_type)
    }

    /// Every declaration across all registered types
    pub fn declarations(&self) -> impl Iterator<Item = &RelationshipDeclaration> {
        self.descriptors.values().flat_map(|d| d.relationships())
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
