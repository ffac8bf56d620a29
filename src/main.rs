//! Confstore CLI - serve and query a versioned configuration store

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "confstore")]
#[command(version)]
#[command(about = "Versioned configuration and secrets store")]
#[command(long_about = r#"
Confstore keeps typed, versioned configuration properties in SQLite and
serves them over a streaming RPC protocol.

Example usage:
  confstore serve --listen 127.0.0.1:7979
  confstore store -n billing -s database port 5432 --type int
  confstore search -n billing
  confstore import ./config
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON instead of human-readable output
    #[arg(long, global = true)]
    json: bool,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the store server
    Serve {
        /// Address to listen on
        #[arg(short, long)]
        listen: Option<String>,

        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,
    },

    /// Store a property
    Store {
        /// Property key
        key: String,

        /// Values, in order
        values: Vec<String>,

        /// Namespace (server defaults to "default")
        #[arg(short, long, default_value = "")]
        namespace: String,

        /// Dotted section path
        #[arg(short, long)]
        section: Option<String>,

        /// Value type: string, int, float or bool
        #[arg(short = 't', long = "type", default_value = "string")]
        value_type: String,

        #[command(flatten)]
        remote: commands::RemoteArgs,
    },

    /// Search properties
    Search {
        /// Namespace to match
        #[arg(short, long)]
        namespace: Option<String>,

        /// Key to match
        #[arg(short, long)]
        key: Option<String>,

        /// Dotted section path to match
        #[arg(short, long)]
        section: Option<String>,

        /// Maximum number of properties (0 = unlimited)
        #[arg(short, long, default_value = "0")]
        limit: i64,

        #[command(flatten)]
        remote: commands::RemoteArgs,
    },

    /// Import section.key entries from a TOML file or a directory holding config.toml
    Import {
        /// File or directory to import
        path: PathBuf,

        #[command(flatten)]
        remote: commands::RemoteArgs,
    },

    /// Show database statistics
    Stats {
        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,
    },

    /// Generate a new hex-encoded secret key
    Keygen,

    /// Write a default confstore.toml
    Init {
        /// Overwrite an existing config
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    pub fn is_human(&self) -> bool {
        *self == OutputMode::Human
    }
}

/// Print a machine-readable success envelope
pub fn emit_success(output_mode: OutputMode, command: &str, data: serde_json::Value) -> anyhow::Result<()> {
    if output_mode == OutputMode::Json {
        let envelope = serde_json::json!({
            "ok": true,
            "command": command,
            "data": data,
        });
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let output_mode = if cli.json { OutputMode::Json } else { OutputMode::Human };
    let config = confstore::config::load_config(cli.config.as_deref())?.unwrap_or_default();

    let result = match cli.command {
        Commands::Serve { listen, database } => commands::run_serve(&config, listen, database).await,
        Commands::Store { key, values, namespace, section, value_type, remote } => {
            commands::run_store(output_mode, &config, remote, key, values, namespace, section, &value_type).await
        }
        Commands::Search { namespace, key, section, limit, remote } => {
            commands::run_search(output_mode, &config, remote, namespace, key, section, limit).await
        }
        Commands::Import { path, remote } => commands::run_import(output_mode, &config, remote, &path).await,
        Commands::Stats { database } => commands::run_stats(output_mode, &config, database),
        Commands::Keygen => commands::run_keygen(output_mode),
        Commands::Init { force } => commands::run_init(output_mode, cli.config.as_deref(), force),
    };

    if let Err(e) = result {
        if output_mode.is_human() {
            confstore::ui::error(&format!("{:#}", e));
        } else {
            let envelope = serde_json::json!({ "ok": false, "error": format!("{:#}", e) });
            println!("{}", serde_json::to_string_pretty(&envelope)?);
        }
        std::process::exit(1);
    }
    Ok(())
}
