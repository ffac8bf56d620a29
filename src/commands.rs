use crate::{OutputMode, emit_success};
use clap::Args;
use confstore::config::{self, ConfstoreConfig};
use confstore::ui::{self, Icons, banner, field, stats_table, success};
use confstore::{
    ConfigStoreClient, Environment, Property, Query, SecretKey, Server, SqliteStore, TypedValue, ValueType,
};
use owo_colors::OwoColorize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Connection flags shared by the client commands
#[derive(Args, Debug, Clone, Default)]
pub struct RemoteArgs {
    /// Server address
    #[arg(short, long)]
    pub address: Option<String>,

    /// Environment: default, development, testing, staging or production
    #[arg(short, long)]
    pub env: Option<String>,
}

fn build_client(config: &ConfstoreConfig, remote: RemoteArgs) -> anyhow::Result<ConfigStoreClient> {
    let address = remote.address.unwrap_or_else(|| config.client.address_or_default());
    let environment: Environment = remote
        .env
        .or_else(|| config.client.environment.clone())
        .unwrap_or_default()
        .parse()?;

    Ok(ConfigStoreClient::new(address, environment).with_deadline(config.client.deadline()))
}

fn split_section(section: Option<String>) -> Vec<String> {
    section
        .map(|s| s.split('.').filter(|p| !p.is_empty()).map(str::to_string).collect())
        .unwrap_or_default()
}

fn print_properties(properties: &[Property]) {
    if properties.is_empty() {
        println!("{} No properties found.", Icons::EMPTY);
        return;
    }
    println!("{}", ui::properties_table(properties));
    if properties.iter().any(Property::is_secret) {
        println!("{}", "Secret values are masked.".style(ui::theme().secret.clone()));
    }
}

pub async fn run_serve(config: &ConfstoreConfig, listen: Option<String>, database: Option<PathBuf>) -> anyhow::Result<()> {
    let listen = listen.unwrap_or_else(|| config.server.listen_or_default());
    let addr: SocketAddr = listen.parse()?;
    let database = database.unwrap_or_else(|| config.server.database_or_default());

    confstore::config::ensure_db_dir(&database)?;
    let store = SqliteStore::open(&database)?;
    tracing::info!("Using database {}", database.display());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    println!("{} Confstore server", Icons::SERVER);
    field("listen", &listener.local_addr()?.to_string());
    field("database", &database.display().to_string());

    let server = Server::new(addr, Arc::new(store));
    server
        .serve_with_shutdown(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub async fn run_store(
    output_mode: OutputMode,
    config: &ConfstoreConfig,
    remote: RemoteArgs,
    key: String,
    values: Vec<String>,
    namespace: String,
    section: Option<String>,
    value_type: &str,
) -> anyhow::Result<()> {
    let client = build_client(config, remote)?;
    let value_type: ValueType = value_type.parse()?;
    let typed = values
        .iter()
        .map(|v| TypedValue::parse(value_type, v))
        .collect::<Result<Vec<_>, _>>()?;

    let property = client.new_property(split_section(section), namespace, key, typed);
    let stored = client.store(vec![property]).await?;

    if output_mode.is_human() {
        stored.iter().for_each(ui::stored);
    } else {
        emit_success(output_mode, "store", serde_json::to_value(&stored)?)?;
    }
    Ok(())
}

pub async fn run_search(
    output_mode: OutputMode,
    config: &ConfstoreConfig,
    remote: RemoteArgs,
    namespace: Option<String>,
    key: Option<String>,
    section: Option<String>,
    limit: i64,
) -> anyhow::Result<()> {
    let client = build_client(config, remote)?;
    let template = Property {
        key: key.unwrap_or_default(),
        namespace: namespace.unwrap_or_default(),
        environment: client.environment(),
        ..Default::default()
    };
    let query = Query::new(template).with_limit(limit);

    if output_mode.is_human() {
        println!("{} Searching {} ...", Icons::SEARCH, client.address());
    }
    let results = match section {
        Some(path) => client.section(split_section(Some(path))).search(query).await?,
        None => client.search(query).await?,
    };

    if output_mode.is_human() {
        print_properties(&results);
    } else {
        emit_success(output_mode, "search", serde_json::to_value(&results)?)?;
    }
    Ok(())
}

pub async fn run_import(
    output_mode: OutputMode,
    config: &ConfstoreConfig,
    remote: RemoteArgs,
    path: &Path,
) -> anyhow::Result<()> {
    let client = build_client(config, remote)?;
    if output_mode.is_human() {
        println!("{} Importing {}", Icons::IMPORT, path.display());
    }

    let stored = client.import_toml(path).await?;

    if output_mode.is_human() {
        print_properties(&stored);
        success(&format!("Imported {} properties", stored.len()));
    } else {
        emit_success(output_mode, "import", serde_json::to_value(&stored)?)?;
    }
    Ok(())
}

pub fn run_stats(output_mode: OutputMode, config: &ConfstoreConfig, database: Option<PathBuf>) -> anyhow::Result<()> {
    let database = database.unwrap_or_else(|| config.server.database_or_default());
    if !database.exists() {
        anyhow::bail!("database not found at {}", database.display());
    }

    let store = SqliteStore::open(&database)?;
    let stats = store.stats()?;

    if output_mode.is_human() {
        println!("{} Confstore Statistics ({})", Icons::STATS, database.display());
        println!("{}", stats_table(&stats));
    } else {
        emit_success(output_mode, "stats", serde_json::to_value(&stats)?)?;
    }
    Ok(())
}

pub fn run_keygen(output_mode: OutputMode) -> anyhow::Result<()> {
    let key = SecretKey::generate();
    if output_mode.is_human() {
        banner(
            &format!("{} {}", Icons::KEY, "New secret key".bold()),
            "Keep it safe: stored secrets cannot be read without it.",
        );
        println!("{}", key.to_hex());
    } else {
        emit_success(output_mode, "keygen", serde_json::json!({ "key": key.to_hex() }))?;
    }
    Ok(())
}

pub fn run_init(output_mode: OutputMode, path: Option<&Path>, force: bool) -> anyhow::Result<()> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(config::default_config_path);
    let mut defaults = ConfstoreConfig::default();
    defaults.server.listen = Some(config::DEFAULT_LISTEN.to_string());
    defaults.server.database = Some(config::default_database_path().display().to_string());
    defaults.client.address = Some(config::DEFAULT_LISTEN.to_string());
    defaults.client.environment = Some(Environment::Default.to_string());
    defaults.client.deadline_secs = Some(config::DEFAULT_DEADLINE_SECS);

    config::write_config(&path, &defaults, force)?;

    if output_mode.is_human() {
        success(&format!("Wrote {}", path.display()));
    } else {
        emit_success(output_mode, "init", serde_json::json!({ "path": path.display().to_string() }))?;
    }
    Ok(())
}
