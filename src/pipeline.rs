//! Two-phase load driver.
//!
//! Phase one loads every table of a directory; phase two resolves
//! relationships against the complete table map and assembles the graph.
//! Resolution never starts before every load has finished.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::config::LoaderConfig;
use crate::error::{ConfigurationError, LoadError};
use crate::graph::{assemble, EntityGraph};
use crate::loader::{DirectoryLoader, SchemaDocument, TableReport, TableSet};
use crate::resolver::{resolve, Edge};
use crate::schema::{RelationshipDeclaration, SchemaRegistry};

/// What a load did besides producing the graph
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub tables: Vec<TableReport>,
    /// Tables left out of the graph, with the error that cost them
    pub failed_tables: BTreeMap<String, String>,
    pub skipped_records: usize,
    pub edges: usize,
    /// Populated declarations whose parent table was not loaded
    pub dangling_declarations: Vec<RelationshipDeclaration>,
    /// Edges the assembler dropped for a missing endpoint table
    pub dropped_edges: Vec<Edge>,
}

impl LoadReport {
    pub fn dropped_edge_count(&self) -> usize {
        self.dangling_declarations.len() + self.dropped_edges.len()
    }

    pub fn records_loaded(&self) -> usize {
        self.tables.iter().map(|table| table.records_loaded).sum()
    }
}

#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub graph: EntityGraph,
    pub report: LoadReport,
}

/// Builds entity graphs from input directories.
///
/// Each call works on its own tables and edges; nothing carries over
/// between loads.
#[derive(Debug, Clone)]
pub struct GraphPipeline {
    registry: Arc<SchemaRegistry>,
    config: LoaderConfig,
    /// Type-level edges declared outside the registry
    extra_edges: Vec<Edge>,
}

impl GraphPipeline {
    pub fn new(registry: SchemaRegistry, config: LoaderConfig) -> Self {
        Self {
            registry: Arc::new(registry),
            config,
            extra_edges: Vec::new(),
        }
    }

    /// Pipeline driven by a schema document instead of a descriptor catalog
    pub fn from_document(document: &SchemaDocument, config: LoaderConfig) -> Result<Self, ConfigurationError> {
        let schema = document.to_registry()?;
        Ok(Self {
            registry: Arc::new(schema.registry),
            config,
            extra_edges: schema.external_edges,
        })
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Load every table in `dir`, then resolve and assemble
    pub async fn load_directory(&self, dir: &Path) -> Result<LoadOutcome, LoadError> {
        info!(path = %dir.display(), "Loading tables");

        let loader = DirectoryLoader::new(Arc::clone(&self.registry), self.config.clone());
        let tables = loader.load_tables(dir).await?;

        Ok(self.build_graph(tables))
    }

    /// Resolve and assemble already loaded tables
    pub fn build_graph(&self, set: TableSet) -> LoadOutcome {
        let skipped_records = set.skipped_records();
        let resolution = resolve(&self.registry, &set.tables);

        let edges = resolution.edges.into_iter().chain(self.extra_edges.iter().cloned());
        let assembly = assemble(set.tables, edges);

        let report = LoadReport {
            tables: set.reports.into_values().collect(),
            failed_tables: set.failures,
            skipped_records,
            edges: assembly.graph.edge_count(),
            dangling_declarations: resolution.dangling.into_iter().collect(),
            dropped_edges: assembly.dropped_edges,
        };

        info!(
            tables = assembly.graph.table_count(),
            records = assembly.graph.record_count(),
            edges = report.edges,
            skipped_records = report.skipped_records,
            dropped_edges = report.dropped_edge_count(),
            failed_tables = report.failed_tables.len(),
            "Entity graph assembled"
        );

        LoadOutcome {
            graph: assembly.graph,
            report,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::TableLoader;
    use crate::materializer::RawRow;
    use crate::schema::{FieldDef, FieldType, ResourceTypeDescriptor};

    fn row(cells: &[(&str, Option<&str>)]) -> RawRow {
        cells
            .iter()
            .map(|(k, v)| (k.to_string(), v.map(|s| s.to_string())))
            .collect()
    }

    fn registry() -> SchemaRegistry {
        let patient = ResourceTypeDescriptor::new("Patient")
            .with_field(FieldDef::new("identifier", FieldType::String))
            .with_identifier_field("identifier");
        let observation = ResourceTypeDescriptor::new("Observation")
            .with_field(FieldDef::new("id", FieldType::String))
            .with_field(FieldDef::new("subject", FieldType::Reference))
            .with_field(FieldDef::new("specimen", FieldType::Reference))
            .with_relationship("subject", "Patient", "identifier")
            .with_relationship("specimen", "Specimen", "id");

        SchemaRegistry::from_descriptors([patient, observation]).unwrap()
    }

    #[test]
    fn test_build_graph_reports_dangling_declarations() {
        let pipeline = GraphPipeline::new(registry(), LoaderConfig::default());
        let loader = TableLoader::new(Arc::new(registry()));

        let mut set = TableSet::default();
        for (name, rows) in [
            ("Patient", vec![row(&[("identifier", Some("p1"))])]),
            (
                "Observation",
                vec![
                    row(&[("id", Some("o1")), ("subject", Some("p1")), ("specimen", Some("s1"))]),
                    row(&[("subject", Some("p1"))]),
                ],
            ),
        ] {
            let loaded = loader.load_table(name, rows).unwrap();
            set.reports.insert(name.to_string(), loaded.report);
            set.tables.insert(name.to_string(), loaded.table);
        }

        let outcome = pipeline.build_graph(set);

        assert_eq!(outcome.graph.edge_count(), 1);
        assert_eq!(outcome.report.edges, 1);
        assert_eq!(outcome.report.skipped_records, 1);
        assert_eq!(outcome.report.records_loaded(), 2);
        assert_eq!(outcome.report.dropped_edge_count(), 1);
        assert_eq!(outcome.report.dangling_declarations[0].parent_type, "Specimen");
    }

    #[test]
    fn test_extra_edges_pass_through_assembler() {
        let document = SchemaDocument::parse(
            "tables:\n  - name: Patient\n    columns:\n      - name: identifier\n        primary_key: true\n        children: [{ table: Claim, column: patient }]\n",
        )
        .unwrap();
        let pipeline = GraphPipeline::from_document(&document, LoaderConfig::default()).unwrap();

        let outcome = pipeline.build_graph(TableSet::default());

        assert_eq!(outcome.graph.edge_count(), 0);
        assert_eq!(
            outcome.report.dropped_edges,
            vec![Edge::new("Patient", "identifier", "Claim", "patient")]
        );
    }

    #[test]
    fn test_report_serializes() {
        let report = LoadReport {
            skipped_records: 3,
            ..Default::default()
        };

        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["skipped_records"], 3);
        assert!(json["tables"].as_array().unwrap().is_empty());
    }
}
