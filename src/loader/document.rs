//! Schema-document variant of the table loader.
//!
//! A schema document declares tables, their typed columns, primary-key and
//! time-index markers, and child relationships per column:
//!
//! ```yaml
//! name: clinical
//! tables:
//!   - name: Patient
//!     columns:
//!       - name: identifier
//!         type: varchar
//!         primary_key: true
//!         children:
//!           - { table: Observation, column: subject }
//!   - name: Observation
//!     columns:
//!       - { name: id, type: uuid }
//!       - { name: subject, type: fk }
//!       - { name: effective, type: timestamp, time_index: true }
//! ```
//!
//! The document converts into a [`SchemaRegistry`], so loading, resolution
//! and assembly are shared with the descriptor-driven path.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::warn;

use crate::error::ConfigurationError;
use crate::resolver::Edge;
use crate::schema::{FieldDef, FieldType, ResourceTypeDescriptor, SchemaRegistry};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaDocument {
    #[serde(default)]
    pub name: Option<String>,
    pub tables: Vec<DocumentTable>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DocumentTable {
    pub name: String,
    pub columns: Vec<DocumentColumn>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DocumentColumn {
    pub name: String,
    #[serde(rename = "type", default)]
    pub declared_type: Option<String>,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub time_index: bool,
    #[serde(rename = "enum", default)]
    pub allowed_values: Option<Vec<String>>,
    #[serde(default)]
    pub children: Vec<ChildRef>,
}

/// A child column referencing the column it is declared on
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChildRef {
    pub table: String,
    pub column: String,
}

/// Registry built from a document, plus the relationships it declares
/// toward tables it does not define
#[derive(Debug, Clone)]
pub struct DocumentSchema {
    pub registry: SchemaRegistry,
    pub external_edges: Vec<Edge>,
}

/// Semantic type for a declared column type, or `None` if unknown
pub fn column_type(declared: &str) -> Option<FieldType> {
    let field_type = match declared.trim().to_ascii_lowercase().as_str() {
        "varchar" | "text" | "string" | "char" | "uuid" => FieldType::String,
        "int" | "integer" | "bigint" | "smallint" => FieldType::Integer,
        "float" | "double" | "real" | "decimal" | "numeric" => FieldType::Float,
        "bool" | "boolean" => FieldType::Boolean,
        "date" | "datetime" | "timestamp" | "time" => FieldType::DateTime,
        "reference" | "ref" | "fk" => FieldType::Reference,
        "code" | "enum" | "category" => FieldType::Code,
        _ => return None,
    };
    Some(field_type)
}

impl SchemaDocument {
    pub fn parse(source: &str) -> Result<Self, String> {
        serde_yaml::from_str(source).map_err(|e| format!("Failed to parse schema document: {}", e))
    }

    /// Read a YAML or JSON schema document
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let source_error = |reason: String| ConfigurationError::SchemaSource {
            path: path.to_path_buf(),
            reason,
        };

        let contents = fs::read_to_string(path).map_err(|e| source_error(e.to_string()))?;
        Self::parse(&contents).map_err(source_error)
    }

    /// Convert the document into a registry of descriptors.
    ///
    /// Children naming a table absent from the document become
    /// [`DocumentSchema::external_edges`].
    pub fn to_registry(&self) -> Result<DocumentSchema, ConfigurationError> {
        let defined: IndexMap<&str, &DocumentTable> =
            self.tables.iter().map(|table| (table.name.as_str(), table)).collect();
        if defined.len() != self.tables.len() {
            let duplicate = self
                .tables
                .iter()
                .enumerate()
                .find(|(index, table)| self.tables[..*index].iter().any(|t| t.name == table.name))
                .map(|(_, table)| table.name.clone())
                .unwrap_or_default();
            return Err(ConfigurationError::InvalidDescriptor {
                resource_type: duplicate,
                reason: "table is declared more than once".to_string(),
            });
        }

        // child table -> (child column, parent table, parent column)
        let mut references: IndexMap<&str, Vec<(&str, &str, &str)>> = IndexMap::new();
        let mut external_edges = Vec::new();

        for table in &self.tables {
            for column in &table.columns {
                for child in &column.children {
                    if defined.contains_key(child.table.as_str()) {
                        references.entry(child.table.as_str()).or_default().push((
                            child.column.as_str(),
                            table.name.as_str(),
                            column.name.as_str(),
                        ));
                    } else {
                        external_edges.push(Edge::new(&table.name, &column.name, &child.table, &child.column));
                    }
                }
            }
        }

        let mut registry = SchemaRegistry::new();
        for table in &self.tables {
            let mut descriptor = table.to_descriptor()?;
            for (child_column, parent_table, parent_column) in
                references.get(table.name.as_str()).into_iter().flatten()
            {
                descriptor = descriptor.with_relationship(*child_column, *parent_table, *parent_column);
            }
            registry.register_descriptor(descriptor)?;
        }

        Ok(DocumentSchema {
            registry,
            external_edges,
        })
    }
}

impl DocumentTable {
    fn to_descriptor(&self) -> Result<ResourceTypeDescriptor, ConfigurationError> {
        let single = |marker: &str, columns: Vec<&DocumentColumn>| match columns.as_slice() {
            [] => Ok(None),
            [column] => Ok(Some(column.name.clone())),
            _ => Err(ConfigurationError::InvalidDescriptor {
                resource_type: self.name.clone(),
                reason: format!("more than one {} column", marker),
            }),
        };

        let primary_key = single("primary key", self.columns.iter().filter(|c| c.primary_key).collect())?;
        let time_index = single("time index", self.columns.iter().filter(|c| c.time_index).collect())?;

        let mut descriptor = ResourceTypeDescriptor::new(&self.name)
            .with_fields(self.columns.iter().map(|column| column.to_field(&self.name)));

        if let Some(primary_key) = primary_key {
            descriptor = descriptor.with_identifier_field(primary_key);
        }
        if let Some(time_index) = time_index {
            descriptor = descriptor.with_time_index(time_index);
        }

        Ok(descriptor)
    }
}

impl DocumentColumn {
    fn to_field(&self, table: &str) -> FieldDef {
        let field_type = match self.declared_type.as_deref() {
            None => FieldType::String,
            Some(declared) => column_type(declared).unwrap_or_else(|| {
                warn!(
                    table,
                    column = %self.name,
                    declared_type = declared,
                    "Unknown column type, treating as string"
                );
                FieldType::String
            }),
        };

        let field = FieldDef::new(&self.name, field_type);
        match &self.allowed_values {
            Some(allowed) => field.with_enum(allowed.iter().cloned()),
            None => field,
        }
    }
}
