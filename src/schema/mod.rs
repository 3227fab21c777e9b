//! Resource type descriptors, the schema registry, and the YAML catalog
//! loader that fills it.

pub mod loader;
pub mod registry;
pub mod types;

pub use loader::{load_schema_file, load_schemas, parse_schemas};
pub use registry::SchemaRegistry;
pub use types::{EnumConstraint, FieldDef, FieldType, RelationshipDeclaration, ResourceTypeDescriptor};
