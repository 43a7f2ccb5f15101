//! CLI entry point for taleweave-build.
//!
//! Results are printed to stdout as JSON; logs go to stderr.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use taleweave_build::config::{BuildConfig, SourceConfig};
use taleweave_build::export::TENSOR_FILE;
use taleweave_build::runner;
use chrono::{DateTime, Utc};
use taleweave_ledger::{FileLedgerStore, LedgerStore, RunId, RunQuery};

#[derive(Parser)]
#[command(name = "taleweave-build")]
#[command(about = "Build the Taleweave narrative knowledge graph and its tensor dataset")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file prefix (default: taleweave).
    #[arg(short, long, default_value = "taleweave", global = true)]
    config: String,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline and write the dataset, tensors, and index table.
    Build {
        /// Record source file; replaces the configured sources. Repeatable.
        #[arg(long = "source")]
        sources: Vec<PathBuf>,
        /// Output directory override.
        #[arg(long)]
        output: Option<PathBuf>,
        /// Abort when any entity has no embedding.
        #[arg(long)]
        strict: bool,
    },
    /// Merge and validate only; print the quality report and graph statistics.
    Validate {
        /// Record source file; replaces the configured sources. Repeatable.
        #[arg(long = "source")]
        sources: Vec<PathBuf>,
    },
    /// Load a run record and check its content hash.
    VerifyLedger {
        #[arg(long)]
        run_id: String,
    },
    /// List recorded runs, newest first.
    Runs {
        /// Only runs with this intent (build, validate).
        #[arg(long)]
        intent: Option<String>,
        /// Only runs that succeeded.
        #[arg(long)]
        succeeded: bool,
        /// Only runs started at or after this RFC 3339 timestamp.
        #[arg(long)]
        since: Option<DateTime<Utc>>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if cli.json_logs {
        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
    }

    let mut config = BuildConfig::load(&cli.config)?;

    match cli.command {
        Command::Build {
            sources,
            output,
            strict,
        } => {
            override_sources(&mut config, sources);
            if let Some(dir) = output {
                config.output_dir = dir;
            }
            config.strict_embeddings |= strict;

            let report = runner::run_build(&config).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "run_id": report.run_id,
                    "nodes": report.output.stats.node_count,
                    "edges": report.output.stats.edge_count,
                    "feature_dim": report.output.tensors.feature_dim,
                    "tensor_checksum": report.export.tensor_checksum,
                    "artifacts": report.export.artifacts,
                    "quality": report.output.quality,
                }))?
            );
        }
        Command::Validate { sources } => {
            override_sources(&mut config, sources);
            let summary = runner::run_validate(&config).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::VerifyLedger { run_id } => {
            let id: RunId = run_id.parse()?;
            let store = FileLedgerStore::new(&config.ledger_dir)?;
            let record = store.get(id)?;

            let tensor = record.artifacts.iter().find(|a| a.name == TENSOR_FILE);
            let tensor_matches = match tensor {
                Some(artifact) if config.output_dir.join(TENSOR_FILE).exists() => {
                    Some(runner::tensor_checksum_matches(&config, &artifact.checksum).await?)
                }
                _ => None,
            };

            tracing::info!(run_id = %record.id, "Run record integrity verified");
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "run_id": record.id,
                    "intent": record.intent,
                    "integrity": "ok",
                    "succeeded": record.succeeded(),
                    "started_at": record.started_at,
                    "completed_at": record.completed_at,
                    "tensor_checksum_matches": tensor_matches,
                }))?
            );
        }
        Command::Runs {
            intent,
            succeeded,
            since,
            limit,
        } => {
            let records = runner::list_runs(
                &config,
                &RunQuery {
                    intent,
                    succeeded_only: succeeded,
                    since,
                    limit: Some(limit),
                },
            )?;

            let runs: Vec<_> = records
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "run_id": r.id,
                        "intent": r.intent,
                        "outcome": r.outcome,
                        "started_at": r.started_at,
                        "artifacts": r.artifacts.len(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&runs)?);
        }
    }

    Ok(())
}

fn override_sources(config: &mut BuildConfig, sources: Vec<PathBuf>) {
    if !sources.is_empty() {
        config.sources = sources.into_iter().map(SourceConfig::from_path).collect();
    }
}
