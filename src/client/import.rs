//! TOML import helpers

use std::path::{Path, PathBuf};
use crate::property::{Environment, Property};
use crate::Result;

/// File name looked up when the import path is a directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

fn resolve_config_path(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join(CONFIG_FILE_NAME)
    } else {
        path.to_path_buf()
    }
}

pub fn read_toml_file(path: &Path) -> Result<toml::Table> {
    let path = resolve_config_path(path);
    tracing::debug!("Reading config from {}", path.display());
    let contents = std::fs::read_to_string(&path)?;
    Ok(toml::from_str(&contents)?)
}

/// Every leaf of `table` as a lowercase dotted path, sorted by path.
///
/// Arrays are leaves; only tables are descended into.
pub fn flatten_toml(table: &toml::Table) -> Vec<(String, toml::Value)> {
    let mut leaves = Vec::new();
    flatten_into(table, "", &mut leaves);
    leaves.sort_by(|a, b| a.0.cmp(&b.0));
    leaves
}

fn flatten_into(table: &toml::Table, prefix: &str, out: &mut Vec<(String, toml::Value)>) {
    for (key, value) in table {
        let path = if prefix.is_empty() {
            key.to_lowercase()
        } else {
            format!("{}.{}", prefix, key.to_lowercase())
        };
        match value {
            toml::Value::Table(inner) => flatten_into(inner, &path, out),
            leaf => out.push((path, leaf.clone())),
        }
    }
}

/// Turn `section.key` leaves into single-value properties.
///
/// Paths with any other number of segments are skipped.
pub fn parse_toml_properties(table: &toml::Table, environment: Environment) -> Result<Vec<Property>> {
    let mut properties = Vec::new();
    for (path, value) in flatten_toml(table) {
        let segments: Vec<&str> = path.split('.').collect();
        let [section, key] = segments.as_slice() else {
            tracing::debug!("Skipping {}: not a section.key path", path);
            continue;
        };

        let property = Property::from_toml_values([*section], "", environment, *key, [&value])?;
        properties.push(property);
    }
    Ok(properties)
}
