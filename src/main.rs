use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use chrono::DateTime;
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::{info, warn};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use datagate::config::AppConfig;
use datagate::database::entities::MonitorFrequency;
use datagate::database::{create_tables, establish_connection, get_database_url};
use datagate::discovery::{derive_trigger_change, TriggerChange};
use datagate::graph::{load_dataset_files, DatasetGraph, Seeds, Traversal};

#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(short, long, global = true)]
    log_level: Option<String>,
    #[clap(short, long, global = true, default_value = "datagate.toml")]
    config: PathBuf,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan the traversal of a set of datasets for the given seed identities
    Plan {
        #[clap(short, long, required = true, num_args = 1..)]
        dataset: Vec<PathBuf>,
        /// Identity seed as label=value, e.g. email=jane@example.com
        #[clap(short, long)]
        seed: Vec<String>,
    },
    /// Print the execution trigger for a monitor schedule
    Trigger {
        #[clap(short, long)]
        frequency: String,
        /// RFC 3339 start date
        #[clap(short, long)]
        start_date: Option<String>,
    },
    Db {
        #[clap(subcommand)]
        command: DbCommands,
    },
}

#[derive(Subcommand, Debug)]
enum DbCommands {
    Init {
        /// Overrides the configured database path
        #[clap(short, long)]
        database: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    setup_logging(&args.log_level);

    let config = AppConfig::load(&args.config)?;

    match args.command {
        Commands::Plan { dataset, seed } => {
            info!("Planning traversal over {} dataset files", dataset.len());
            let seeds = parse_seeds(&seed)?;
            let graph = DatasetGraph::new(load_dataset_files(&dataset)?)?;
            let traversal = Traversal::new(&graph, &seeds)?;

            println!("Entry points:");
            for address in traversal.entry_points() {
                println!("  {}", address);
            }
            println!("Execution order:");
            for (position, node) in traversal.execution_nodes().iter().enumerate() {
                println!(
                    "  {:>3}. {} [{}]",
                    position + 1,
                    node.address,
                    node.connection_key
                );
            }
            if !traversal.skipped().is_empty() {
                println!("Unreachable:");
                for address in traversal.skipped() {
                    println!("  {}", address);
                }
            }
        }
        Commands::Trigger {
            frequency,
            start_date,
        } => {
            let frequency = MonitorFrequency::from_str(&frequency)
                .ok_or_else(|| anyhow!("Unknown frequency: {}", frequency))?;
            let start_date = start_date
                .map(|date| {
                    DateTime::parse_from_rfc3339(&date)
                        .with_context(|| format!("Invalid start date: {}", date))
                })
                .transpose()?;

            match derive_trigger_change(Some(frequency), start_date) {
                TriggerChange::Set(trigger) => {
                    println!("{}", serde_json::to_string_pretty(&trigger)?)
                }
                TriggerChange::Clear => println!("null"),
                TriggerChange::Keep => {
                    warn!("A start date is required for {} monitors", frequency.as_str());
                    println!("null");
                }
            }
        }
        Commands::Db { command } => match command {
            DbCommands::Init { database } => {
                let database = database.unwrap_or(config.database.path);
                info!("Initializing database: {}", database);
                let db = establish_connection(&get_database_url(Some(&database))).await?;
                create_tables(&db).await?;
            }
        },
    }

    Ok(())
}

/// `label=value` pairs; values that parse as JSON keep their type
fn parse_seeds(pairs: &[String]) -> Result<Seeds> {
    let mut seeds = Seeds::new();
    for pair in pairs {
        let (label, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("Seed must look like label=value: {}", pair))?;
        let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
        seeds.insert(label.trim().to_string(), value);
    }
    Ok(seeds)
}

fn setup_logging(log_level: &Option<String>) {
    let log_level = match log_level
        .as_ref()
        .unwrap_or(&"info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!("sqlx=warn,{}", log_level)))
        .without_time()
        .init();
}
