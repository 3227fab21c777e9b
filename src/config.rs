//! Loader configuration.
//!
//! Every setting has a default, so an empty YAML document is a valid
//! configuration:
//!
//! ```yaml
//! delimiter: ","
//! file_extensions: [csv, tsv]
//! null_markers: ["", "null", "NULL"]
//! on_record_error: skip
//! on_table_error: omit
//! max_concurrent_loads: 8
//! ignore_unknown_files: false
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// What to do with a row that fails materialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecordErrorPolicy {
    /// Skip the row, count it, and keep loading the table
    #[default]
    Skip,
    /// Fail the whole table
    Fail,
}

/// What to do with a table whose input cannot be loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TableErrorPolicy {
    /// Leave the table out and assemble the graph from the rest
    #[default]
    Omit,
    /// Abort the whole load
    Abort,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoaderConfig {
    /// Field delimiter for delimited-text inputs (`.tsv` files always use tab)
    pub delimiter: char,
    /// Extensions of files treated as table inputs
    pub file_extensions: Vec<String>,
    /// Cell values (after trimming) treated as null
    pub null_markers: Vec<String>,
    pub on_record_error: RecordErrorPolicy,
    pub on_table_error: TableErrorPolicy,
    /// Upper bound on tables loaded concurrently
    pub max_concurrent_loads: usize,
    /// Skip input files that map to no registered type instead of failing
    pub ignore_unknown_files: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            delimiter: ',',
            file_extensions: vec!["csv".to_string(), "tsv".to_string()],
            null_markers: vec!["".to_string(), "null".to_string(), "NULL".to_string()],
            on_record_error: RecordErrorPolicy::Skip,
            on_table_error: TableErrorPolicy::Omit,
            max_concurrent_loads: 8,
            ignore_unknown_files: false,
        }
    }
}

impl LoaderConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();

        let contents = fs::read_to_string(path).map_err(|e| {
            ConfigurationError::InvalidConfig(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Self::from_yaml_str(&contents)
    }

    /// Parse and validate configuration from YAML
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigurationError> {
        // An empty document deserializes to unit, not to an empty mapping
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(yaml)
                .map_err(|e| ConfigurationError::InvalidConfig(format!("Failed to parse YAML: {}", e)))?
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !self.delimiter.is_ascii() {
            return Err(ConfigurationError::InvalidConfig(format!(
                "delimiter '{}' is not an ASCII character",
                self.delimiter
            )));
        }

        if self.max_concurrent_loads == 0 {
            return Err(ConfigurationError::InvalidConfig(
                "max_concurrent_loads must be at least 1".to_string(),
            ));
        }

        if self.file_extensions.is_empty() {
            return Err(ConfigurationError::InvalidConfig(
                "file_extensions cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Delimiter byte for a given input file
    pub fn delimiter_for(&self, path: &Path) -> u8 {
        let is_tsv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("tsv"));

        if is_tsv {
            b'\t'
        } else {
            self.delimiter as u8
        }
    }

    pub fn accepts_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.file_extensions
                    .iter()
                    .any(|accepted| accepted.eq_ignore_ascii_case(ext))
            })
    }
}
