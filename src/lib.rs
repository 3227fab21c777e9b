//! # ehrgraph: Schema-Driven Entity Graph Builder
//!
//! ehrgraph loads tabular extracts of clinical and administrative records,
//! one file per resource type, materializes every row into a typed record
//! and assembles an entity graph whose nodes are per-type tables and whose
//! edges are the foreign-key relationships the records actually realize.
//! The graph is handed to an external feature-engineering implementation.
//!
//! ## Features
//!
//! - **Schema registry**: per-type fields, enum constraints and relationship declarations, loaded from YAML
//! - **Record materializer**: drops unknown columns, checks enums case-insensitively, coerces values, resolves identity
//! - **Table loader**: static primary-key and time-index policy per type, parallel directory loading
//! - **Schema documents**: an alternate loader driven by a declarative table/column document
//! - **Relationship resolution**: deduplicated type-level edges, lenient toward absent tables
//!
//! ## Example: Resource Type
//!
//! ```yaml
//! resource_type:
//!   name: Observation
//!   identifier_field: id
//!   time_index: effective_date_time
//!   fields:
//!     - name: id
//!     - name: subject
//!       type: reference
//!     - name: effective_date_time
//!       type: date_time
//!   relationships:
//!     - field: subject
//!       references: Patient
//!       key: identifier
//! ```
//!
//! ## Example: Loading a Directory
//!
//! ```ignore
//! let registry = ehrgraph::schema::load_schemas("config/schemas")?;
//! let pipeline = GraphPipeline::new(registry, LoaderConfig::default());
//! let outcome = pipeline.load_directory(Path::new("data/extract")).await?;
//! println!("{} edges", outcome.graph.edge_count());
//! ```

// Schema registry and catalog
pub mod schema;

// Records and materialization
pub mod materializer;
pub mod record;

// Table loading
pub mod config;
pub mod loader;
pub mod naming;

// Relationship resolution and graph assembly
pub mod graph;
pub mod pipeline;
pub mod resolver;

// Hand-off to feature engineering
pub mod synthesis;

pub mod error;

// Re-export key types
pub use config::{LoaderConfig, RecordErrorPolicy, TableErrorPolicy};
pub use error::{ConfigurationError, Error, GraphError, LoadError, MaterializationError, Result};
pub use graph::{assemble, Assembly, EntityGraph};
pub use loader::{DirectoryLoader, SchemaDocument, Table, TableLoader, TableReport};
pub use materializer::{Materializer, RawRow};
pub use pipeline::{GraphPipeline, LoadOutcome, LoadReport};
pub use record::{FieldValue, Record};
pub use resolver::{resolve, Edge, Resolution};
pub use schema::{
    EnumConstraint, FieldDef, FieldType, RelationshipDeclaration, ResourceTypeDescriptor, SchemaRegistry,
};
pub use synthesis::{synthesize_features, CutoffTime, FeatureMatrix, FeatureSynthesizer, SynthesisRequest};
