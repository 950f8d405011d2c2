use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, debug, info_span, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use extract::GeminiClient;
use graph::{GraphReport, GraphStore, Neo4jStore};
use pipeline::{AppConfig, Pipeline, RunReport};

#[derive(Parser, Debug)]
#[command(name = "docgraph", about = "Turn a document into a knowledge graph in Neo4j")]
struct Cli {
    /// PDF, text or markdown file to process
    #[arg(default_value = "samples/sample.pdf")]
    file: PathBuf,

    /// Skip the prose summary at the end
    #[arg(long)]
    no_narrative: bool,

    /// Print a summary of the graph after loading
    #[arg(long)]
    report: bool,

    /// Extract and sanitize without touching the database
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::from_env()?;
    init_tracing();

    if cli.no_narrative {
        config.narrative.enabled = false;
    }
    debug!(
        config = %serde_json::to_string(&config).unwrap_or_default(),
        "Configuration loaded"
    );

    let run_id = Uuid::new_v4();
    run(cli, config)
        .instrument(info_span!("run", %run_id))
        .await
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: Cli, config: AppConfig) -> Result<()> {
    if config.llm.api_key.is_empty() {
        warn!("GEMINI_API_KEY is not set, model requests will be rejected");
    }
    let model = GeminiClient::new(
        config.llm.base_url.clone(),
        config.llm.model.clone(),
        config.llm.api_key.clone(),
        Duration::from_secs(config.llm.timeout_secs),
    )
    .context("Failed to create Gemini client")?;

    let store = if cli.dry_run {
        None
    } else {
        let neo4j = Neo4jStore::connect(&config.neo4j_config())
            .await
            .context("Failed to connect to Neo4j")?;
        let store: Arc<dyn GraphStore> = Arc::new(neo4j);
        Some(store)
    };

    let pipeline = Pipeline::new(config, Arc::new(model), store.clone())?;
    let report = pipeline.run_file(&cli.file).await?;
    print_report(&report);

    if cli.report {
        match &store {
            Some(store) => match GraphReport::collect(store.as_ref()).await {
                Ok(graph_report) => print!("\n{}", graph_report.render()),
                Err(e) => warn!(error = %e, "Graph report unavailable"),
            },
            None => println!("\nGraph report not available in a dry run."),
        }
    }

    if let Some(narrative) = &report.narrative {
        println!("\n{narrative}");
    }

    println!("\n{}", report.metrics.summary());
    Ok(())
}

fn print_report(report: &RunReport) {
    println!("Document split into {} chunk(s)", report.chunks);
    if !report.failed_chunks.is_empty() {
        println!(
            "Skipped chunk(s) {:?} after retries and fallback splitting",
            report.failed_chunks
        );
    }

    if report.graph_skipped {
        println!("No statements were extracted; graph step skipped.");
    } else if let Some(load) = &report.load {
        println!(
            "Loaded {} statement(s) in {} batch(es), {} batch(es) failed",
            load.statements_executed, load.batches_committed, load.batches_failed
        );
    } else {
        println!(
            "Dry run: {} sanitized statement(s), nothing written",
            report.statements.len()
        );
    }
}
