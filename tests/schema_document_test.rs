//! Integration tests for the schema-document loader

use std::fs;
use std::path::{Path, PathBuf};

use ehrgraph::loader::column_type;
use ehrgraph::{Edge, FieldType, GraphPipeline, LoaderConfig, SchemaDocument};

fn manifest_path(relative: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join(relative)
}

#[test]
fn test_sample_document_converts() {
    let document = SchemaDocument::from_path(manifest_path("config/documents/clinical.yaml")).unwrap();
    assert_eq!(document.name.as_deref(), Some("clinical-core"));

    let schema = document.to_registry().unwrap();

    let names: Vec<&str> = schema.registry.type_names().collect();
    assert_eq!(names, vec!["Patient", "Encounter", "Observation"]);
    assert_eq!(
        schema.external_edges,
        vec![Edge::new("Patient", "identifier", "Claim", "patient")]
    );

    let observation = schema.registry.lookup("Observation").unwrap();
    assert_eq!(observation.field("value_quantity").unwrap().field_type, FieldType::Float);
    assert_eq!(observation.relationships().len(), 2);
}

#[tokio::test]
async fn test_document_pipeline_matches_model() {
    let document = SchemaDocument::from_path(manifest_path("config/documents/clinical.yaml")).unwrap();
    let config = LoaderConfig {
        ignore_unknown_files: true,
        ..Default::default()
    };
    let pipeline = GraphPipeline::from_document(&document, config).unwrap();

    let outcome = pipeline.load_directory(&manifest_path("demos/extract")).await.unwrap();
    let graph = &outcome.graph;

    assert_eq!(graph.table_count(), 3);
    assert!(!graph.contains_table("AuditEvent"));

    let expected = [
        Edge::new("Encounter", "id", "Encounter", "part_of"),
        Edge::new("Encounter", "id", "Observation", "encounter"),
        Edge::new("Patient", "identifier", "Encounter", "subject"),
        Edge::new("Patient", "identifier", "Observation", "subject"),
    ];
    assert_eq!(graph.edges().cloned().collect::<Vec<_>>(), expected.to_vec());

    // status is not part of the document, so every observation loads
    assert_eq!(graph.table("Observation").unwrap().len(), 4);
    assert_eq!(graph.table("Patient").unwrap().primary_key_field(), "identifier");
    assert_eq!(graph.table("Encounter").unwrap().time_index_field(), Some("period_start"));

    assert_eq!(
        outcome.report.dropped_edges,
        vec![Edge::new("Patient", "identifier", "Claim", "patient")]
    );
}

#[tokio::test]
async fn test_json_document_against_tempdir() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("schema.json"),
        r#"{
  "tables": [
    {"name": "Specimen", "columns": [
      {"name": "id", "type": "text", "primary_key": true,
       "children": [{"table": "Specimen", "column": "parent"}]},
      {"name": "parent", "type": "ref"},
      {"name": "collected", "type": "datetime", "time_index": true}
    ]}
  ]
}"#,
    )
    .unwrap();
    let data = dir.path().join("data");
    fs::create_dir(&data).unwrap();
    fs::write(data.join("specimen.csv"), "id,parent,collected\ns1,,2024-01-01\ns2,s1,2024-01-02\n").unwrap();

    let document = SchemaDocument::from_path(dir.path().join("schema.json")).unwrap();
    let pipeline = GraphPipeline::from_document(&document, LoaderConfig::default()).unwrap();
    let outcome = pipeline.load_directory(&data).await.unwrap();

    assert_eq!(
        outcome.graph.edges().cloned().collect::<Vec<_>>(),
        vec![Edge::new("Specimen", "id", "Specimen", "parent")]
    );
    assert_eq!(outcome.graph.processing_levels().unwrap(), vec![vec!["Specimen".to_string()]]);
}

#[test]
fn test_unknown_column_type_falls_back_to_string() {
    assert_eq!(column_type("geometry"), None);

    let document = SchemaDocument::parse(
        "tables:\n  - name: Location\n    columns:\n      - { name: id, primary_key: true }\n      - { name: position, type: geometry }\n",
    )
    .unwrap();
    let schema = document.to_registry().unwrap();

    let location = schema.registry.lookup("Location").unwrap();
    assert_eq!(location.field("position").unwrap().field_type, FieldType::String);
}

#[tokio::test]
async fn test_document_with_non_standard_primary_key() {
    let document = SchemaDocument::parse(
        r#"tables:
  - name: Patient
    columns:
      - name: mrn
        primary_key: true
        children: [{ table: Visit, column: mrn }]
      - { name: gender, type: text }
  - name: Visit
    columns:
      - { name: visit_no, primary_key: true }
      - { name: mrn, type: fk }
"#,
    )
    .unwrap();
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("patient.csv"), "mrn,gender\nm1,female\nm2,male\n").unwrap();
    fs::write(dir.path().join("visit.csv"), "visit_no,mrn\nv1,m1\n").unwrap();

    let pipeline = GraphPipeline::from_document(&document, LoaderConfig::default()).unwrap();
    let outcome = pipeline.load_directory(dir.path()).await.unwrap();

    assert_eq!(outcome.graph.table("Patient").unwrap().len(), 2);
    assert_eq!(outcome.graph.table("Visit").unwrap().len(), 1);
    assert_eq!(outcome.report.skipped_records, 0);
    assert_eq!(
        outcome.graph.edges().cloned().collect::<Vec<_>>(),
        vec![Edge::new("Patient", "mrn", "Visit", "mrn")]
    );
}
