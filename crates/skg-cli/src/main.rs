//! SKG CLI - Command-line interface
//!
//! Usage:
//!   skg extract <file>
//!   skg search <file> <query> [--top-k N | --threshold T]
//!   skg ask <file> <question>
//!   skg link <file> [--target entities|triples] [--threshold T] [--limit N]
//!   skg analyze <file> [--algorithm greedy|louvain]
//!   skg run <file> [--query Q] [--question Q]

mod commands;
mod models;

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use skg_core::{AppConfig, CommunityAlgorithm, LinkTarget, LoggingConfig};
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::commands::LinkOptions;
use crate::models::Models;

#[derive(Parser)]
#[command(name = "skg")]
#[command(about = "Semantic knowledge graph from sentence tables")]
#[command(version)]
struct Cli {
    /// TOML configuration file (environment variables override it)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract triples and export them as CSV
    Extract {
        /// CSV or Excel file with a sentence column
        file: PathBuf,
    },
    /// Rank entities by semantic similarity to a query
    Search {
        file: PathBuf,
        query: String,
        /// Return the N most similar entities (bare flag: search.top_k)
        #[arg(long, num_args = 0..=1, conflicts_with = "threshold")]
        top_k: Option<Option<usize>>,
        /// Return every entity scoring above T
        #[arg(long)]
        threshold: Option<f32>,
    },
    /// Answer a question from the extracted triples
    Ask { file: PathBuf, question: String },
    /// Link semantically similar entities or triples
    Link {
        file: PathBuf,
        #[arg(long)]
        target: Option<LinkTarget>,
        #[arg(long)]
        threshold: Option<f32>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Centrality and community analysis
    Analyze {
        file: PathBuf,
        #[arg(long)]
        algorithm: Option<CommunityAlgorithm>,
    },
    /// Extract, analyze and link in one pass
    Run {
        file: PathBuf,
        /// Semantic search query
        #[arg(long)]
        query: Option<String>,
        /// Question for the heuristic matcher
        #[arg(long)]
        question: Option<String>,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::from_file(path)?.with_env_override()?,
        None => AppConfig::from_env()?,
    };
    config.validate()?;
    Ok(config)
}

fn init_tracing(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if config.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn execute(command: Commands, config: &AppConfig) -> anyhow::Result<()> {
    let models = Models::global(config).context("Failed to initialize models")?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match command {
        Commands::Extract { file } => {
            commands::extract(models, config, &file, &mut out).await?;
        }
        Commands::Search {
            file,
            query,
            top_k,
            threshold,
        } => {
            let mode = commands::query_mode(&config.search, top_k, threshold);
            commands::search(models, config, &file, &query, mode, &mut out).await?;
        }
        Commands::Ask { file, question } => {
            commands::ask(models, config, &file, &question, &mut out).await?;
        }
        Commands::Link {
            file,
            target,
            threshold,
            limit,
        } => {
            let mut linking = config.clone();
            if let Some(target) = target {
                linking.linking.target = target;
            }
            let mut options = LinkOptions::from_config(&linking);
            if let Some(threshold) = threshold {
                options.threshold = threshold;
            }
            if let Some(limit) = limit {
                options = options.with_limit(limit);
            }
            commands::link(models, config, &file, options, &mut out).await?;
        }
        Commands::Analyze { file, algorithm } => {
            let algorithm = algorithm.unwrap_or(config.analytics.algorithm);
            commands::analyze(models, config, &file, algorithm, &mut out).await?;
        }
        Commands::Run {
            file,
            query,
            question,
        } => {
            commands::run_all(
                models,
                config,
                &file,
                query.as_deref(),
                question.as_deref(),
                &mut out,
            )
            .await?;
        }
    }

    out.flush()?;
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e:#}");
            std::process::exit(2);
        }
    };
    init_tracing(&config.logging);

    if let Err(e) = execute(cli.command, &config).await {
        error!(error = %e, "command failed");
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}
