use tabled::{settings::Style, Table, Tabled};
use crate::property::Property;
use crate::storage::DbStats;

/// One rendered property
#[derive(Tabled)]
pub struct PropertyRow {
    #[tabled(rename = "Namespace")]
    pub namespace: String,
    #[tabled(rename = "Section")]
    pub section: String,
    #[tabled(rename = "Key")]
    pub key: String,
    #[tabled(rename = "Env")]
    pub environment: String,
    #[tabled(rename = "Rev")]
    pub revision: i64,
    #[tabled(rename = "Values")]
    pub values: String,
}

impl From<&Property> for PropertyRow {
    fn from(p: &Property) -> Self {
        Self {
            namespace: p.namespace.clone(),
            section: p.section.join("."),
            key: p.key.clone(),
            environment: p.environment.to_string(),
            revision: p.revision,
            values: p.display_values(),
        }
    }
}

#[derive(Tabled)]
struct CountRow {
    #[tabled(rename = "Counter")]
    counter: &'static str,
    #[tabled(rename = "Value")]
    value: usize,
}

/// Render properties as a table; empty input renders nothing.
pub fn properties_table(properties: &[Property]) -> String {
    if properties.is_empty() {
        return String::new();
    }
    let rows: Vec<PropertyRow> = properties.iter().map(PropertyRow::from).collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn stats_table(stats: &DbStats) -> String {
    let rows = [
        CountRow { counter: "Rows", value: stats.rows },
        CountRow { counter: "Properties", value: stats.properties },
        CountRow { counter: "Namespaces", value: stats.namespaces },
    ];
    Table::new(rows).with(Style::rounded()).to_string()
}
