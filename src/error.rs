//! Error taxonomy for schema lookup, record materialization, table loading
//! and graph assembly.

use std::path::PathBuf;

use thiserror::Error;

use crate::schema::FieldType;

/// Top-level error for ehrgraph operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Materialization error: {0}")]
    Materialization(#[from] MaterializationError),

    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Feature synthesis failed: {0}")]
    Synthesis(String),
}

/// Registry or configuration mismatch. Never recovered.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("Unknown resource type: {0}")]
    UnknownResourceType(String),

    #[error("Resource type '{0}' is already registered with a different descriptor")]
    ConflictingDescriptor(String),

    #[error("Invalid descriptor for '{resource_type}': {reason}")]
    InvalidDescriptor {
        resource_type: String,
        reason: String,
    },

    #[error("Failed to load schema source {path}: {reason}")]
    SchemaSource { path: PathBuf, reason: String },

    #[error("Invalid loader configuration: {0}")]
    InvalidConfig(String),
}

/// Failure to turn a single raw row into a record. Recoverable per record.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MaterializationError {
    #[error("Value '{value}' for field '{field}' is not one of {allowed:?}")]
    EnumViolation {
        field: String,
        value: String,
        allowed: Vec<String>,
    },

    #[error("Record of type '{resource_type}' has no identifier, id or object_id")]
    MissingIdentifier { resource_type: String },

    #[error("Value '{value}' for field '{field}' is not a valid {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: FieldType,
    },
}

/// Failure to load one resource type's input. Isolated to that table unless
/// it wraps a configuration error.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Row {row} of '{resource_type}' rejected: {source}")]
    Record {
        resource_type: String,
        row: usize,
        #[source]
        source: MaterializationError,
    },

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("Resource type '{resource_type}' has more than one input: {first} and {second}")]
    DuplicateInput {
        resource_type: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("Load task for '{resource_type}' did not complete: {reason}")]
    Task {
        resource_type: String,
        reason: String,
    },
}

impl LoadError {
    /// Configuration errors abort the whole load; everything else only
    /// costs the table it happened in.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LoadError::Configuration(_))
    }
}

/// Errors raised by graph queries. Assembly itself never fails.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("Circular relationship detected involving tables: {0:?}")]
    Cycle(Vec<String>),

    #[error("Table '{0}' is not part of the entity graph")]
    UnknownTable(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
