//! Parallel loading of a directory of per-type input files.
//!
//! Every file is loaded on the blocking pool, at most
//! `max_concurrent_loads` at a time. Draining the join set is the barrier
//! after which the complete table map is handed to the resolver.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{Id, JoinSet};
use tracing::{debug, warn};

use crate::config::{LoaderConfig, TableErrorPolicy};
use crate::error::{ConfigurationError, LoadError};
use crate::loader::table::{LoadedTable, Table, TableLoader, TableReport};
use crate::naming::resource_type_for_stem;
use crate::schema::SchemaRegistry;

/// One input file and the resource type it holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInput {
    pub resource_type: String,
    pub path: PathBuf,
}

/// Tables loaded from one directory, keyed by resource type
#[derive(Debug, Clone, Default)]
pub struct TableSet {
    pub tables: BTreeMap<String, Table>,
    pub reports: BTreeMap<String, TableReport>,
    /// Tables left out under the `omit` policy, with the reason
    pub failures: BTreeMap<String, String>,
}

impl TableSet {
    pub fn skipped_records(&self) -> usize {
        self.reports.values().map(|report| report.skipped_records).sum()
    }
}

pub struct DirectoryLoader {
    loader: TableLoader,
    config: Arc<LoaderConfig>,
}

impl DirectoryLoader {
    pub fn new(registry: Arc<SchemaRegistry>, config: LoaderConfig) -> Self {
        let loader = TableLoader::new(registry).with_record_policy(config.on_record_error);
        Self {
            loader,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Find the input files in `dir` and map each to its resource type.
    ///
    /// Files are returned in path order. Two files for the same type fail
    /// with [`LoadError::DuplicateInput`].
    pub fn discover(&self, dir: &Path) -> Result<Vec<TableInput>, LoadError> {
        let io_error = |source: std::io::Error| LoadError::Io {
            path: dir.to_path_buf(),
            source,
        };

        let mut paths = Vec::new();
        for entry in fs::read_dir(dir).map_err(io_error)? {
            let path = entry.map_err(io_error)?.path();
            if path.is_file() && self.config.accepts_extension(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut seen: BTreeMap<String, PathBuf> = BTreeMap::new();
        let mut inputs = Vec::with_capacity(paths.len());

        for path in paths {
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()).map(str::to_string) else {
                warn!(path = %path.display(), "Skipping file whose name is not valid UTF-8");
                continue;
            };

            let Some(resource_type) = resource_type_for_stem(self.loader.registry(), &stem) else {
                if self.config.ignore_unknown_files {
                    warn!(path = %path.display(), "Ignoring file with no matching resource type");
                    continue;
                }
                return Err(ConfigurationError::UnknownResourceType(stem).into());
            };

            if let Some(first) = seen.get(&resource_type) {
                return Err(LoadError::DuplicateInput {
                    resource_type,
                    first: first.clone(),
                    second: path,
                });
            }

            debug!(resource_type = %resource_type, path = %path.display(), "Discovered table input");
            seen.insert(resource_type.clone(), path.clone());
            inputs.push(TableInput { resource_type, path });
        }

        Ok(inputs)
    }

    /// Load every table in `dir` concurrently.
    ///
    /// A fatal error aborts the load. Any other table failure either aborts
    /// (`abort`) or leaves the table out and is recorded in
    /// [`TableSet::failures`] (`omit`).
    pub async fn load_tables(&self, dir: &Path) -> Result<TableSet, LoadError> {
        let inputs = self.discover(dir)?;
        self.load_inputs(inputs).await
    }

    pub async fn load_inputs(&self, inputs: Vec<TableInput>) -> Result<TableSet, LoadError> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_loads));
        let mut tasks = JoinSet::new();
        let mut task_types = HashMap::new();

        for input in inputs {
            let resource_type = input.resource_type.clone();
            let handle = tasks.spawn(load_input(
                Arc::clone(&semaphore),
                self.loader.clone(),
                Arc::clone(&self.config),
                input,
            ));
            task_types.insert(handle.id(), resource_type);
        }

        self.collect(tasks, task_types).await
    }

    /// Drain the load tasks, applying the table error policy to each result
    async fn collect(
        &self,
        mut tasks: JoinSet<Result<LoadedTable, LoadError>>,
        mut task_types: HashMap<Id, String>,
    ) -> Result<TableSet, LoadError> {
        let mut set = TableSet::default();

        while let Some(joined) = tasks.join_next_with_id().await {
            let (resource_type, result) = match joined {
                Ok((id, result)) => (task_types.remove(&id).unwrap_or_default(), result),
                Err(e) => {
                    let resource_type = task_types.remove(&e.id()).unwrap_or_default();
                    let error = LoadError::Task {
                        resource_type: resource_type.clone(),
                        reason: e.to_string(),
                    };
                    (resource_type, Err(error))
                }
            };

            match result {
                Ok(LoadedTable { table, report }) => {
                    set.reports.insert(resource_type.clone(), report);
                    set.tables.insert(resource_type, table);
                }
                Err(e) if e.is_fatal() || self.config.on_table_error == TableErrorPolicy::Abort => {
                    tasks.abort_all();
                    return Err(e);
                }
                Err(e) => {
                    warn!(resource_type = %resource_type, error = %e, "Omitting table that failed to load");
                    set.failures.insert(resource_type, e.to_string());
                }
            }
        }

        Ok(set)
    }
}

async fn load_input(
    semaphore: Arc<Semaphore>,
    loader: TableLoader,
    config: Arc<LoaderConfig>,
    input: TableInput,
) -> Result<LoadedTable, LoadError> {
    let task_error = |resource_type: &str, reason: String| LoadError::Task {
        resource_type: resource_type.to_string(),
        reason,
    };

    let _permit = semaphore
        .acquire_owned()
        .await
        .map_err(|e| task_error(&input.resource_type, e.to_string()))?;

    let resource_type = input.resource_type.clone();
    tokio::task::spawn_blocking(move || loader.load_file(&input.resource_type, &input.path, &config))
        .await
        .map_err(|e| task_error(&resource_type, e.to_string()))?
}
