use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_LISTEN: &str = "127.0.0.1:7979";
pub const DEFAULT_DEADLINE_SECS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfstoreConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub client: ClientConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServerConfig {
    pub listen: Option<String>,
    pub database: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClientConfig {
    pub address: Option<String>,
    pub environment: Option<String>,
    pub deadline_secs: Option<u64>,
}

impl ServerConfig {
    pub fn listen_or_default(&self) -> String {
        self.listen.clone().unwrap_or_else(|| DEFAULT_LISTEN.to_string())
    }

    pub fn database_or_default(&self) -> PathBuf {
        self.database
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(default_database_path)
    }
}

impl ClientConfig {
    pub fn address_or_default(&self) -> String {
        self.address.clone().unwrap_or_else(|| DEFAULT_LISTEN.to_string())
    }

    pub fn deadline(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.deadline_secs.unwrap_or(DEFAULT_DEADLINE_SECS))
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("confstore.toml")
}

pub fn default_database_path() -> PathBuf {
    PathBuf::from(".confstore").join("confstore.db")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<ConfstoreConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: ConfstoreConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &ConfstoreConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("nope.toml"))).unwrap().is_none());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("confstore.toml");
        std::fs::write(&path, "[client]\nenvironment = \"prod\"\ndeadline_secs = 5\n").unwrap();

        let config = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(config.client.environment.as_deref(), Some("prod"));
        assert_eq!(config.client.deadline(), std::time::Duration::from_secs(5));
        assert_eq!(config.server.listen_or_default(), DEFAULT_LISTEN);
        assert_eq!(config.server.database_or_default(), default_database_path());
    }

    #[test]
    fn test_write_config_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("confstore.toml");
        let config = ConfstoreConfig::default();

        write_config(&path, &config, false).unwrap();
        assert!(write_config(&path, &config, false).is_err());
        write_config(&path, &config, true).unwrap();
    }

    #[test]
    fn test_ensure_db_dir_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("nested").join("store.db");
        ensure_db_dir(&db).unwrap();
        assert!(db.parent().unwrap().exists());
    }
}
