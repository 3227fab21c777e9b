//! ehrgraph CLI - build and inspect entity graphs from tabular extracts
//!
//! Loads a directory of per-type input files against a schema catalog or a
//! schema document and prints the resulting tables, edges and load report.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process;

use ehrgraph::{GraphPipeline, LoadOutcome, LoaderConfig, SchemaDocument};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "ehrgraph")]
#[command(version, about = "Schema-driven entity graph builder for clinical record extracts", long_about = None)]
struct Cli {
    /// Loader configuration file (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print the load report as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a data directory against a schema catalog
    Load {
        /// Directory of resource type schema files
        #[arg(short, long, default_value = "config/schemas")]
        schemas: PathBuf,

        /// Directory of per-type input files
        data: PathBuf,
    },

    /// Load a data directory against a schema document
    LoadDocument {
        /// Schema document (YAML or JSON)
        document: PathBuf,

        /// Directory of per-type input files
        data: PathBuf,
    },

    /// Validate a schema catalog without loading data
    Validate {
        /// Directory of resource type schema files
        #[arg(short, long, default_value = "config/schemas")]
        schemas: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Load { schemas, data } => load(&schemas, &data, cli.config.as_deref(), cli.json).await,
        Commands::LoadDocument { document, data } => {
            load_document(&document, &data, cli.config.as_deref(), cli.json).await
        }
        Commands::Validate { schemas } => validate_schemas(&schemas),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn loader_config(path: Option<&Path>) -> Result<LoaderConfig, String> {
    match path {
        Some(path) => LoaderConfig::from_file(path).map_err(|e| e.to_string()),
        None => Ok(LoaderConfig::default()),
    }
}

/// Load a data directory against a schema catalog
async fn load(schemas: &Path, data: &Path, config: Option<&Path>, json: bool) -> Result<(), String> {
    let config = loader_config(config)?;
    let registry = ehrgraph::schema::load_schemas(schemas).map_err(|e| e.to_string())?;

    if !json {
        println!("🔧 Loaded {} resource types from {}", registry.len(), schemas.display());
    }

    let pipeline = GraphPipeline::new(registry, config);
    let outcome = pipeline.load_directory(data).await.map_err(|e| e.to_string())?;

    print_outcome(&outcome, json)
}

/// Load a data directory against a schema document
async fn load_document(document: &Path, data: &Path, config: Option<&Path>, json: bool) -> Result<(), String> {
    let config = loader_config(config)?;
    let document = SchemaDocument::from_path(document).map_err(|e| e.to_string())?;
    let pipeline = GraphPipeline::from_document(&document, config).map_err(|e| e.to_string())?;

    if !json {
        let name = document.name.as_deref().unwrap_or("schema document");
        println!("🔧 Loaded {} tables from {}", pipeline.registry().len(), name);
    }

    let outcome = pipeline.load_directory(data).await.map_err(|e| e.to_string())?;

    print_outcome(&outcome, json)
}

fn validate_schemas(schemas: &Path) -> Result<(), String> {
    println!("🔍 Validating schemas in {}...", schemas.display());

    let registry = ehrgraph::schema::load_schemas(schemas).map_err(|e| e.to_string())?;

    println!("  ✓ {} resource types validated", registry.len());
    println!("  ✓ {} relationship declarations", registry.declarations().count());
    println!("✅ All schemas are valid!");

    Ok(())
}

fn print_outcome(outcome: &LoadOutcome, json: bool) -> Result<(), String> {
    if json {
        let report = serde_json::to_string_pretty(&outcome.report)
            .map_err(|e| format!("Failed to serialize report: {}", e))?;
        println!("{}", report);
        return Ok(());
    }

    let graph = &outcome.graph;
    let report = &outcome.report;

    println!("📦 Tables ({}):", graph.table_count());
    for table in graph.tables() {
        let time_index = table.time_index_field().unwrap_or("-");
        println!(
            "  ✓ {} ({} records, key: {}, time index: {})",
            table.resource_type(),
            table.len(),
            table.primary_key_field(),
            time_index
        );
    }

    println!("🔗 Edges ({}):", graph.edge_count());
    for edge in graph.edges() {
        println!("  {}", edge);
    }

    for (table, reason) in &report.failed_tables {
        println!("  ✗ {} omitted: {}", table, reason);
    }

    println!(
        "✅ {} records loaded, {} skipped, {} edges dropped",
        report.records_loaded(),
        report.skipped_records,
        report.dropped_edge_count()
    );

    Ok(())
}
