//! Table loading: delimited-text input, the per-type table loader, parallel
//! directory loading and the schema-document variant.

pub mod directory;
pub mod document;
pub mod source;
pub mod table;

pub use directory::{DirectoryLoader, TableInput, TableSet};
pub use document::{column_type, DocumentSchema, SchemaDocument};
pub use source::{read_rows, DelimitedRows};
pub use table::{primary_key_field, time_index_field, LoadedTable, Table, TableLoader, TableReport, DEFAULT_PRIMARY_KEY};
