//! HeartGuard CLI
//!
//! Command-line tools for inspecting and syncing HeartGuard offline data.
//!
//! # Commands
//!
//! - `enqueue` - Queue a mutation for the next sync
//! - `list` - List pending mutations in replay order
//! - `status` - Show sync status
//! - `sync` - Replay the queue against the API
//! - `cache` - Store an asset in the cache
//! - `get-cache` - Print a cached asset
//! - `clear` - Discard all offline data

mod commands;

use clap::{Parser, Subcommand};
use heartguard_offline::HttpMethod;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// HeartGuard offline data tools.
#[derive(Parser)]
#[command(name = "heartguard")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the offline data directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Base URL of the HeartGuard API
    #[arg(global = true, short, long, env = "HEARTGUARD_BASE_URL")]
    base_url: Option<String>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Queue a mutation for the next sync
    Enqueue {
        /// HTTP method (POST, PUT, DELETE)
        method: HttpMethod,

        /// API endpoint, e.g. /api/log
        endpoint: String,

        /// JSON payload
        #[arg(default_value = "{}")]
        payload: String,
    },

    /// List pending mutations in replay order
    List {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show sync status
    Status {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Replay pending mutations against the API
    Sync,

    /// Store an asset in the cache, fetching it unless content is given
    Cache {
        /// URL or API path
        url: String,

        /// Content to store instead of fetching
        content: Option<String>,
    },

    /// Print a cached asset
    GetCache {
        /// URL the asset was cached under
        url: String,
    },

    /// Discard all pending mutations and cached assets
    Clear,

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so JSON output stays clean.
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Version = cli.command {
        println!("HeartGuard CLI v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let path = cli.path.ok_or("Data directory required (--path)")?;
    let facade = commands::open(&path, cli.base_url.as_deref())?;

    match cli.command {
        Commands::Enqueue {
            method,
            endpoint,
            payload,
        } => commands::queue::enqueue(&facade, &endpoint, method, &payload)?,
        Commands::List { format } => commands::queue::list(&facade, &format)?,
        Commands::Status { format } => commands::queue::status(&facade, &format)?,
        Commands::Sync => {
            if cli.base_url.is_none() {
                return Err("API base URL required for sync (--base-url)".into());
            }
            commands::sync::run(&facade).await?;
        }
        Commands::Cache {
            url,
            content: Some(content),
        } => commands::cache::store(&facade, &url, &content)?,
        Commands::Cache { url, content: None } => {
            if cli.base_url.is_none() && !url.contains("://") {
                return Err("API base URL required to fetch a relative path".into());
            }
            commands::cache::fetch(&facade, &url).await?;
        }
        Commands::GetCache { url } => commands::cache::show(&facade, &url)?,
        Commands::Clear => commands::queue::clear(&facade)?,
        Commands::Version => {}
    }

    Ok(())
}
