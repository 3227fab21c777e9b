//! Delimited-text table input.
//!
//! The header row supplies column names; every following row becomes a
//! [`RawRow`]. Short rows are padded with nulls and cells matching a
//! configured null marker become `None`.

use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::LoaderConfig;
use crate::error::LoadError;
use crate::materializer::RawRow;

/// Streaming iterator over the rows of one delimited-text file
pub struct DelimitedRows {
    records: csv::StringRecordsIntoIter<File>,
    headers: Vec<String>,
    null_markers: Vec<String>,
    path: PathBuf,
}

impl DelimitedRows {
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    fn to_row(&self, record: &csv::StringRecord) -> RawRow {
        if record.len() > self.headers.len() {
            debug!(
                path = %self.path.display(),
                cells = record.len(),
                columns = self.headers.len(),
                "Ignoring cells beyond the header"
            );
        }

        self.headers
            .iter()
            .enumerate()
            .map(|(index, column)| {
                let cell = record
                    .get(index)
                    .filter(|cell| !self.null_markers.iter().any(|marker| marker == cell))
                    .map(|cell| cell.to_string());
                (column.clone(), cell)
            })
            .collect()
    }
}

impl Iterator for DelimitedRows {
    type Item = Result<RawRow, LoadError>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.next()?;
        Some(match record {
            Ok(record) => Ok(self.to_row(&record)),
            Err(source) => Err(LoadError::Csv {
                path: self.path.clone(),
                source,
            }),
        })
    }
}

/// Open a delimited-text file and read its header row
pub fn read_rows(path: &Path, config: &LoaderConfig) -> Result<DelimitedRows, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(config.delimiter_for(path))
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?
        .iter()
        .map(|header| header.trim_start_matches('\u{feff}').to_string())
        .collect();

    Ok(DelimitedRows {
        records: reader.into_records(),
        headers,
        null_markers: config.null_markers.clone(),
        path: path.to_path_buf(),
    })
}
