//! YAML schema catalog loader.
//!
//! The per-type schema bodies are configuration data. Each YAML file holds
//! either a single `resource_type:` or a `resource_types:` list:
//!
//! ```yaml
//! resource_type:
//!   name: Observation
//!   identifier_field: id
//!   time_index: effective_date_time
//!   fields:
//!     - name: id
//!     - name: status
//!       type: code
//!       enum: [registered, preliminary, final, amended]
//!     - name: subject
//!       type: reference
//!     - name: effective_date_time
//!       type: date_time
//!   relationships:
//!     - field: subject
//!       references: Patient
//!       key: identifier
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigurationError;
use crate::schema::registry::SchemaRegistry;
use crate::schema::types::{FieldDef, ResourceTypeDescriptor};

/// Schema file wrapper
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SchemaFile {
    #[serde(default)]
    resource_type: Option<ResourceTypeDef>,
    #[serde(default)]
    resource_types: Vec<ResourceTypeDef>,
}

/// Resource type as written in YAML
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ResourceTypeDef {
    name: String,
    #[serde(default)]
    identifier_field: Option<String>,
    #[serde(default)]
    time_index: Option<String>,
    fields: Vec<FieldDef>,
    #[serde(default)]
    relationships: Vec<ReferenceDef>,
}

/// Relationship written from the child's side: `field` references
/// `references.key`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ReferenceDef {
    field: String,
    references: String,
    key: String,
}

impl ResourceTypeDef {
    fn into_descriptor(self) -> ResourceTypeDescriptor {
        let mut descriptor = ResourceTypeDescriptor::new(self.name).with_fields(self.fields);

        if let Some(identifier) = self.identifier_field {
            descriptor = descriptor.with_identifier_field(identifier);
        }
        if let Some(time_index) = self.time_index {
            descriptor = descriptor.with_time_index(time_index);
        }
        for reference in self.relationships {
            descriptor = descriptor.with_relationship(reference.field, reference.references, reference.key);
        }

        descriptor
    }
}

/// Load every schema file in a directory into a new registry.
///
/// Files are processed in sorted path order; only `.yaml` and `.yml` files
/// are considered.
///
/// # Example
///
/// ```ignore
/// use ehrgraph::schema::load_schemas;
///
/// let registry = load_schemas("config/schemas")?;
/// ```
pub fn load_schemas<P: AsRef<Path>>(dir: P) -> Result<SchemaRegistry, ConfigurationError> {
    let dir_path = dir.as_ref();
    let source_error = |reason: String| ConfigurationError::SchemaSource {
        path: dir_path.to_path_buf(),
        reason,
    };

    if !dir_path.is_dir() {
        return Err(source_error("not a directory".to_string()));
    }

    let read_dir = fs::read_dir(dir_path).map_err(|e| source_error(e.to_string()))?;

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|e| source_error(e.to_string()))?;
        let path = entry.path();
        if let Some(ext) = path.extension() {
            if ext == "yaml" || ext == "yml" {
                paths.push(path);
            }
        }
    }
    paths.sort();

    let mut registry = SchemaRegistry::new();
    for path in paths {
        for descriptor in load_schema_file(&path)? {
            registry.register_descriptor(descriptor)?;
        }
    }

    Ok(registry)
}

/// Load the descriptors declared in a single schema file
pub fn load_schema_file<P: AsRef<Path>>(
    path: P,
) -> Result<Vec<ResourceTypeDescriptor>, ConfigurationError> {
    let path = path.as_ref();

    let contents = fs::read_to_string(path).map_err(|e| ConfigurationError::SchemaSource {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    parse_schemas(&contents).map_err(|reason| ConfigurationError::SchemaSource {
        path: path.to_path_buf(),
        reason,
    })
}

/// Parse schema YAML into descriptors (not yet validated)
pub fn parse_schemas(yaml: &str) -> Result<Vec<ResourceTypeDescriptor>, String> {
    let file: SchemaFile =
        serde_yaml::from_str(yaml).map_err(|e| format!("Failed to parse YAML: {}", e))?;

    let mut defs = file.resource_types;
    if let Some(single) = file.resource_type {
        defs.insert(0, single);
    }

    if defs.is_empty() {
        return Err("no 'resource_type' or 'resource_types' entries".to_string());
    }

    Ok(defs.into_iter().map(ResourceTypeDef::into_descriptor).collect())
}
