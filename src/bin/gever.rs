//! gever - command line access to a GEVER backend
//!
//! Usage:
//!   gever --user john.doe fetch https://gever.example.org/fd/ordnungssystem
//!   gever --user john.doe listing https://gever.example.org/fd/ --name dossiers --column title
//!
//! Environment variables:
//!   OPENGEVER_APICLIENT_KEY_DIRS - Service key directories (path list)
//!   OPENGEVER_APICLIENT_USER_AGENT - Text appended to the User-Agent header
//!   OPENGEVER_APICLIENT_USER - Acting user
//!   RUST_LOG - Log filter

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gever_client::{ApiContext, ClientConfig, ContentApi, ListingApi, LogConfig, Model};
use serde_json::{json, Value};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "gever")]
#[command(about = "Query a GEVER backend with a service key")]
#[command(version)]
struct Args {
    /// User the requests are made for
    #[arg(long, env = "OPENGEVER_APICLIENT_USER")]
    user: String,

    /// Additional service key directory, searched after the configured ones
    #[arg(long = "key-dir")]
    key_dirs: Vec<PathBuf>,

    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Log level when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch a resource
    Fetch { url: String },

    /// Fetch a listing below a resource
    Listing {
        url: String,

        /// Listing name
        #[arg(long, default_value = "dossiers")]
        name: String,

        /// Column to include, may be repeated
        #[arg(long = "column")]
        columns: Vec<String>,
    },

    /// Fetch the navigation tree of a resource
    Navigation { url: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = gever_client::logging::init_logging(
        LogConfig::stdout_only().with_log_level(args.log_level.clone()),
    )?;

    let mut config = ClientConfig::from_env();
    for dir in &args.key_dirs {
        config = config.with_key_dir(dir);
    }
    if let Some(timeout) = args.timeout {
        config = config.with_timeout(timeout);
    }
    let context = ApiContext::new(config).context("Failed to set up GEVER client")?;

    let output = match &args.command {
        Command::Fetch { url } => {
            let model = context.client(url, &args.user)?.fetch().await?;
            Value::Object(model.raw().clone())
        }
        Command::Listing { url, name, columns } => {
            let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
            let listing = context.client(url, &args.user)?.listing(name, &columns).await?;
            let items: Vec<Value> = listing
                .items
                .iter()
                .map(|item| Value::Object(item.raw().clone()))
                .collect();
            json!({
                "items_total": listing.items_total,
                "batching": listing.batching,
                "items": items,
            })
        }
        Command::Navigation { url } => context.client(url, &args.user)?.get_navigation().await?,
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&output).context("Failed to render response")?
    );
    Ok(())
}
