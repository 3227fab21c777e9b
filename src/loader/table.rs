//! Tables and the per-type table loader.
//!
//! Key and time-index choices are static per type: they come from the
//! descriptor, never from the data.

use std::path::Path;
use std::sync::Arc;

use indexmap::IndexSet;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{LoaderConfig, RecordErrorPolicy};
use crate::error::LoadError;
use crate::loader::source::read_rows;
use crate::materializer::{materialize_row, RawRow};
use crate::record::{FieldValue, Record};
use crate::schema::{ResourceTypeDescriptor, SchemaRegistry};

/// Primary key name for types that declare no identifier field
pub const DEFAULT_PRIMARY_KEY: &str = "object_id";

/// Primary key field for a type: its explicit identifier field, or the
/// sentinel [`DEFAULT_PRIMARY_KEY`]
pub fn primary_key_field(descriptor: &ResourceTypeDescriptor) -> &str {
    descriptor.identifier_field().unwrap_or(DEFAULT_PRIMARY_KEY)
}

/// Time index field, only for types the descriptor marks temporal
pub fn time_index_field(descriptor: &ResourceTypeDescriptor) -> Option<&str> {
    descriptor.time_index()
}

/// All materialized records of one resource type
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    resource_type: String,
    primary_key_field: String,
    time_index_field: Option<String>,
    records: Vec<Record>,
}

impl Table {
    pub fn new(descriptor: &ResourceTypeDescriptor, records: Vec<Record>) -> Self {
        Self {
            resource_type: descriptor.name().to_string(),
            primary_key_field: primary_key_field(descriptor).to_string(),
            time_index_field: time_index_field(descriptor).map(str::to_string),
            records,
        }
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn primary_key_field(&self) -> &str {
        &self.primary_key_field
    }

    pub fn time_index_field(&self) -> Option<&str> {
        self.time_index_field.as_deref()
    }

    /// Records in insertion order
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Key of a record in this table.
    ///
    /// Falls back to the record identity when the key field is the sentinel
    /// or is null.
    pub fn key_of<'r>(&self, record: &'r Record) -> &'r FieldValue {
        record
            .get(&self.primary_key_field)
            .filter(|value| !value.is_null())
            .unwrap_or_else(|| record.identity())
    }

    /// Values of one field across all records
    pub fn column<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a FieldValue> + 'a {
        self.records.iter().filter_map(move |record| record.get(field))
    }
}

/// Per-table load statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableReport {
    pub resource_type: String,
    pub rows_read: usize,
    pub records_loaded: usize,
    pub skipped_records: usize,
    /// Input columns not declared by the type, in first-seen order
    pub dropped_columns: Vec<String>,
}

/// A loaded table and how its load went
#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub table: Table,
    pub report: TableReport,
}

/// Loads rows of one resource type into a [`Table`].
///
/// Holds no state between calls; each call produces an independent table.
#[derive(Debug, Clone)]
pub struct TableLoader {
    registry: Arc<SchemaRegistry>,
    on_record_error: RecordErrorPolicy,
}

impl TableLoader {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self {
            registry,
            on_record_error: RecordErrorPolicy::default(),
        }
    }

    pub fn with_record_policy(mut self, policy: RecordErrorPolicy) -> Self {
        self.on_record_error = policy;
        self
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Load in-memory rows of `resource_type`
    pub fn load_table<I>(&self, resource_type: &str, rows: I) -> Result<LoadedTable, LoadError>
    where
        I: IntoIterator<Item = RawRow>,
    {
        self.load_rows(resource_type, rows.into_iter().map(Ok))
    }

    /// Load one delimited-text file as `resource_type`
    pub fn load_file(
        &self,
        resource_type: &str,
        path: &Path,
        config: &LoaderConfig,
    ) -> Result<LoadedTable, LoadError> {
        // Unknown types fail before the file is touched
        self.registry.lookup(resource_type)?;

        let rows = read_rows(path, config)?;
        self.load_rows(resource_type, rows)
    }

    /// Load rows from a fallible source. A source error fails the table; a
    /// materialization error is handled by the record policy.
    pub fn load_rows<I>(&self, resource_type: &str, rows: I) -> Result<LoadedTable, LoadError>
    where
        I: IntoIterator<Item = Result<RawRow, LoadError>>,
    {
        let descriptor = self.registry.lookup(resource_type)?;

        let mut report = TableReport {
            resource_type: resource_type.to_string(),
            ..Default::default()
        };
        let mut dropped_columns: IndexSet<String> = IndexSet::new();
        let mut records = Vec::new();

        for (index, row) in rows.into_iter().enumerate() {
            let row = row?;
            let row_number = index + 1;
            report.rows_read += 1;

            match materialize_row(descriptor, &row) {
                Ok(materialized) => {
                    for column in materialized.dropped_columns {
                        if !dropped_columns.contains(&column) {
                            warn!(
                                resource_type,
                                column = %column,
                                "Dropping column not declared by the resource type"
                            );
                            dropped_columns.insert(column);
                        }
                    }
                    records.push(materialized.record);
                }
                Err(source) => match self.on_record_error {
                    RecordErrorPolicy::Skip => {
                        warn!(resource_type, row = row_number, error = %source, "Skipping record");
                        report.skipped_records += 1;
                    }
                    RecordErrorPolicy::Fail => {
                        return Err(LoadError::Record {
                            resource_type: resource_type.to_string(),
                            row: row_number,
                            source,
                        });
                    }
                },
            }
        }

        report.records_loaded = records.len();
        report.dropped_columns = dropped_columns.into_iter().collect();

        debug!(
            resource_type,
            records = report.records_loaded,
            skipped = report.skipped_records,
            "Table loaded"
        );

        Ok(LoadedTable {
            table: Table::new(descriptor, records),
            report,
        })
    }
}
