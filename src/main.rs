//! Binary entry point for itemdb.
//!
//! Runs the REST server or a single repository operation from the command
//! line.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use anyhow::Context;
use clap::{Parser, Subcommand};
use itemdb::config::ItemdbConfig;
use itemdb::http;
use itemdb::observability::{self, InitOptions};
use itemdb::{ItemRepository, ItemStoreFactory, StoreBackendType};
use serde_json::{Value, json};
use std::path::PathBuf;
use std::process::ExitCode;

/// itemdb - a small item database with pluggable storage backends.
#[derive(Parser)]
#[command(name = "itemdb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "ITEMDB_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Storage backend: filesystem, sqlite, postgresql, redis or memory.
    #[arg(short, long, global = true)]
    backend: Option<StoreBackendType>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Run the REST server.
    Serve {
        /// Bind host.
        #[arg(long)]
        host: Option<String>,

        /// Bind port.
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Create the backing collection if it does not exist.
    Init,

    /// Print every item.
    List,

    /// Print one item.
    Get {
        /// Item identifier.
        id: String,
    },

    /// Create an item from a JSON object.
    Add {
        /// Item as JSON, e.g. '{"name":"a"}'.
        json: String,
    },

    /// Replace the fields of an item.
    Update {
        /// Item identifier.
        id: String,

        /// New fields as JSON.
        json: String,
    },

    /// Delete one item.
    Delete {
        /// Item identifier.
        id: String,
    },

    /// Delete every item.
    Clear,
}

/// Main entry point.
#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is normal.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let (config, skipped_config) = match load_config(&cli) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Failed to load configuration: {e:#}");
            return ExitCode::FAILURE;
        },
    };

    if let Err(e) = observability::init_from_config(
        &config,
        InitOptions {
            verbose: cli.verbose,
            metrics_expose: matches!(cli.command, Commands::Serve { .. }),
        },
    ) {
        eprintln!("Failed to initialize observability: {e}");
        return ExitCode::FAILURE;
    }

    if let Some(e) = skipped_config {
        tracing::warn!(error = %e, "Ignoring unreadable config file, using defaults");
    }

    match run_command(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

/// Loads configuration and applies command-line overrides.
///
/// Also returns the error from a default config file that was skipped.
fn load_config(cli: &Cli) -> anyhow::Result<(ItemdbConfig, Option<itemdb::Error>)> {
    let (mut config, skipped) = ItemdbConfig::load(cli.config.as_deref())?;

    if let Some(backend) = cli.backend {
        config.storage.backend = backend;
    }
    if let Commands::Serve { host, port } = &cli.command {
        if let Some(host) = host {
            config.server.host.clone_from(host);
        }
        if let Some(port) = port {
            config.server.port = *port;
        }
    }

    Ok((config, skipped))
}

/// Runs the selected command.
async fn run_command(command: Commands, config: ItemdbConfig) -> anyhow::Result<()> {
    let store = ItemStoreFactory::create(&config.storage).context("failed to create item store")?;
    let repository = ItemRepository::from_arc(store);
    repository
        .initialize()
        .await
        .with_context(|| format!("failed to initialize {} store", config.storage.backend))?;

    match command {
        Commands::Serve { .. } => cmd_serve(repository, &config).await,
        Commands::Init => print_result(json!({
            "backend": config.storage.backend.as_str(),
            "collection": config.storage.collection,
        })),
        Commands::List => print_result(repository.get_all().await?),
        Commands::Get { id } => print_result(repository.get_by_id(&id).await?),
        Commands::Add { json } => print_result(repository.add_item(parse_json(&json)?).await?),
        Commands::Update { id, json } => {
            print_result(repository.update_by_id(&id, parse_json(&json)?).await?)
        },
        Commands::Delete { id } => print_result(repository.delete_by_id(&id).await?),
        Commands::Clear => print_result(repository.delete_all().await?),
    }
}

/// Serve command.
async fn cmd_serve(repository: ItemRepository, config: &ItemdbConfig) -> anyhow::Result<()> {
    let addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(
        addr = %addr,
        backend = %config.storage.backend,
        collection = %config.storage.collection,
        "Starting itemdb server"
    );

    http::serve(listener, repository).await?;
    Ok(())
}

fn parse_json(text: &str) -> anyhow::Result<Value> {
    serde_json::from_str(text).context("argument is not valid JSON")
}

/// Prints a value in the same envelope the REST surface uses.
fn print_result(value: impl Into<Value>) -> anyhow::Result<()> {
    let body = serde_json::to_string_pretty(&http::success(value))?;
    println!("{body}");
    Ok(())
}
