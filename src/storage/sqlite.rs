//! SQLite storage implementation

use std::collections::HashMap;
use std::path::Path;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, params, params_from_iter};
use rusqlite::types::Value as SqlValue;
use crate::{Result, Error};
use crate::property::{Environment, Property, Query};
use crate::value::{DecodeError, Value, ValueType};
use super::{schema, PropertyStorage};

/// SQLite-backed append-only property storage
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open a database file (creates the table if it doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::initialize_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Create the schema on first use. There is no migration path: an
    /// existing table is left as-is.
    fn initialize_schema(conn: &Connection) -> Result<()> {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            [schema::PROPERTIES_TABLE],
            |row| row.get(0),
        )?;
        if exists {
            return Ok(());
        }

        tracing::info!("Creating {} table", schema::PROPERTIES_TABLE);
        for stmt in schema::all_schema_statements() {
            conn.execute(stmt, [])?;
        }
        Ok(())
    }

    // ========== Property Operations ==========

    /// Insert one row per value of the property.
    ///
    /// Sets `created` to now. A property without values is stored as a single
    /// row with a NULL value so its identity still exists.
    pub fn insert_property(&self, mut property: Property) -> Result<Property> {
        let created = Utc::now();
        property.created = Some(created);

        let created_str = created.to_rfc3339_opts(SecondsFormat::Nanos, true);
        let deleted_str = property
            .deleted
            .map(|d| d.to_rfc3339_opts(SecondsFormat::Nanos, true));
        let section = property.joined_section();

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO properties ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                schema::COLUMNS
            ))?;

            let mut insert = |value: Option<&Value>, order: i64| {
                stmt.execute(params![
                    property.key,
                    value.map(|v| v.data.as_str()),
                    order,
                    value.map(|v| v.value_type.code()).unwrap_or(0),
                    value.map(|v| v.secret).unwrap_or(false),
                    section,
                    property.namespace,
                    property.environment.code(),
                    property.revision,
                    property.version,
                    created_str,
                    deleted_str,
                ])
            };

            if property.values.is_empty() {
                insert(None, 0)?;
            } else {
                for (order, value) in property.values.iter().enumerate() {
                    insert(Some(value), order as i64)?;
                }
            }
        }
        tx.commit()?;

        tracing::debug!(
            key = %property.key,
            namespace = %property.namespace,
            revision = property.revision,
            values = property.values.len(),
            "Stored property"
        );
        Ok(property)
    }

    /// Search properties matching the query template.
    ///
    /// Only the latest revision of each (key, namespace, environment) is
    /// returned, values in their original order, truncated to `query.limit`.
    pub fn search_properties(&self, query: &Query) -> Result<Vec<Property>> {
        let (sql, values) = build_search_sql(query);
        tracing::debug!(%sql, params = values.len(), "Search query");

        let rows = {
            let conn = self.conn.lock();
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(values.iter()), Self::row_to_raw)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };

        let mut properties = group_rows(rows)?;
        if properties.is_empty() {
            return Err(Error::NoRowsFound);
        }

        if query.limit > 0 && properties.len() > query.limit as usize {
            properties.truncate(query.limit as usize);
        }
        Ok(properties)
    }

    /// Count all rows
    pub fn count_rows(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM properties", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Count distinct (key, namespace, environment) identities
    pub fn count_identities(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM (SELECT DISTINCT key, namespace, environment FROM properties)",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Count distinct namespaces
    pub fn count_namespaces(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(DISTINCT namespace) FROM properties", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats> {
        Ok(DbStats {
            rows: self.count_rows()?,
            properties: self.count_identities()?,
            namespaces: self.count_namespaces()?,
        })
    }

    /// Helper to read a row without interpreting it
    fn row_to_raw(row: &rusqlite::Row) -> rusqlite::Result<RawRow> {
        Ok(RawRow {
            key: row.get(0)?,
            value: row.get(1)?,
            value_order: row.get(2)?,
            value_type: row.get(3)?,
            secret: row.get(4)?,
            section: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
            namespace: row.get(6)?,
            environment: row.get(7)?,
            revision: row.get(8)?,
            version: row.get::<_, Option<String>>(9)?.unwrap_or_default(),
            created: row.get(10)?,
            deleted: row.get(11)?,
        })
    }
}

impl PropertyStorage for SqliteStore {
    fn store(&self, property: Property) -> Result<Property> {
        self.insert_property(property)
    }

    fn search(&self, query: &Query) -> Result<Vec<Property>> {
        self.search_properties(query)
    }
}

/// Build the SELECT for a query.
///
/// Only set template fields become predicates. `ignore_value` is accepted
/// but does not change the predicate set.
pub(crate) fn build_search_sql(query: &Query) -> (String, Vec<SqlValue>) {
    let mut sql = format!("SELECT {} FROM properties", schema::COLUMNS);
    let mut predicates: Vec<&str> = Vec::new();
    let mut values: Vec<SqlValue> = Vec::new();

    if let Some(template) = &query.property {
        if !template.key.is_empty() {
            predicates.push("key = ?");
            values.push(SqlValue::Text(template.key.clone()));
        }
        if !template.namespace.is_empty() {
            predicates.push("namespace = ?");
            values.push(SqlValue::Text(template.namespace.clone()));
        }
        if !template.environment.is_default() {
            predicates.push("environment = ?");
            values.push(SqlValue::Integer(template.environment.code()));
        }
        if template.revision != 0 {
            predicates.push("revision = ?");
            values.push(SqlValue::Integer(template.revision));
        }
        if !template.version.is_empty() {
            predicates.push("version = ?");
            values.push(SqlValue::Text(template.version.clone()));
        }
    }

    if !predicates.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&predicates.join(" AND "));
    }

    sql.push_str(" ORDER BY revision DESC, created DESC, key, namespace, environment, value_order");
    (sql, values)
}

/// A row exactly as stored
#[derive(Debug, Clone)]
pub(crate) struct RawRow {
    pub key: String,
    pub value: Option<String>,
    pub value_order: i64,
    pub value_type: i64,
    pub secret: bool,
    pub section: String,
    pub namespace: String,
    pub environment: i64,
    pub revision: i64,
    pub version: String,
    pub created: String,
    pub deleted: Option<String>,
}

impl RawRow {
    /// Rows of one stored revision share this
    fn group_key(&self) -> (String, String, i64, i64, String) {
        (
            self.key.clone(),
            self.namespace.clone(),
            self.environment,
            self.revision,
            self.created.clone(),
        )
    }

    fn identity(&self) -> (String, String, i64) {
        (self.key.clone(), self.namespace.clone(), self.environment)
    }

    fn to_property(&self) -> Result<Property> {
        Ok(Property {
            key: self.key.clone(),
            section: Property::split_section(&self.section),
            namespace: self.namespace.clone(),
            environment: Environment::from_code(self.environment)?,
            values: Vec::new(),
            revision: self.revision,
            version: self.version.clone(),
            created: Some(parse_timestamp(&self.created)?),
            deleted: self.deleted.as_deref().map(parse_timestamp).transpose()?,
        })
    }

    fn to_value(&self) -> Result<Option<Value>> {
        let Some(data) = &self.value else {
            return Ok(None);
        };
        Ok(Some(Value {
            value_type: ValueType::from_code(self.value_type)?,
            data: data.clone(),
            secret: self.secret,
        }))
    }
}

fn parse_timestamp(s: &str) -> std::result::Result<DateTime<Utc>, DecodeError> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|_| DecodeError::Timestamp(s.to_string()))
}

/// Rebuild properties from rows.
///
/// Rows are grouped by stored revision with an explicit map, so grouping does
/// not depend on rows of one key arriving next to each other. The first
/// group seen per identity is the latest revision; older ones are dropped.
/// Group order follows first appearance in `rows`.
pub(crate) fn group_rows(rows: Vec<RawRow>) -> Result<Vec<Property>> {
    let mut properties: Vec<Property> = Vec::new();
    let mut groups: HashMap<(String, String, i64, i64, String), usize> = HashMap::new();
    let mut latest: HashMap<(String, String, i64), (i64, String)> = HashMap::new();

    for row in rows {
        let identity = row.identity();
        let group_key = row.group_key();

        match latest.get(&identity) {
            Some((revision, created)) if *revision != row.revision || *created != row.created => {
                continue;
            }
            Some(_) => {}
            None => {
                latest.insert(identity, (row.revision, row.created.clone()));
            }
        }

        let idx = match groups.get(&group_key) {
            Some(idx) => *idx,
            None => {
                properties.push(row.to_property()?);
                groups.insert(group_key, properties.len() - 1);
                properties.len() - 1
            }
        };

        if let Some(value) = row.to_value()? {
            properties[idx].values.push(value);
        }
    }

    Ok(properties)
}

/// Database statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct DbStats {
    pub rows: usize,
    pub properties: usize,
    pub namespaces: usize,
}

impl std::fmt::Display for DbStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Database Statistics:")?;
        writeln!(f, "  Rows: {}", self.rows)?;
        writeln!(f, "  Properties: {}", self.properties)?;
        writeln!(f, "  Namespaces: {}", self.namespaces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_property(key: &str, namespace: &str, values: &[&str]) -> Property {
        Property::new(["section"], namespace, Environment::Default, key, values.iter().copied())
    }

    fn raw(key: &str, value: &str, order: i64, revision: i64, created: &str) -> RawRow {
        RawRow {
            key: key.to_string(),
            value: Some(value.to_string()),
            value_order: order,
            value_type: 0,
            secret: false,
            section: String::new(),
            namespace: "default".to_string(),
            environment: 0,
            revision,
            version: String::new(),
            created: created.to_string(),
            deleted: None,
        }
    }

    #[test]
    fn test_store_and_search_roundtrip() {
        let store = SqliteStore::open_in_memory().unwrap();

        let stored = store.insert_property(sample_property("foo", "ns", &["a", "b", "c"])).unwrap();
        assert!(stored.created.is_some());

        let found = store.search_properties(&Query::identity("foo", "ns", Environment::Default)).unwrap();
        assert_eq!(found.len(), 1);
        let values: Vec<&str> = found[0].values.iter().map(|v| v.data.as_str()).collect();
        assert_eq!(values, vec!["a", "b", "c"]);
        assert_eq!(found[0].section, vec!["section"]);
        assert_eq!(found[0].created, stored.created);
    }

    #[test]
    fn test_one_row_per_value() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_property(sample_property("multi", "ns", &["1", "2", "3"])).unwrap();
        store.insert_property(sample_property("empty", "ns", &[])).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.rows, 4);
        assert_eq!(stats.properties, 2);
        assert_eq!(stats.namespaces, 1);

        let found = store.search_properties(&Query::identity("empty", "ns", Environment::Default)).unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].values.is_empty());
    }

    #[test]
    fn test_search_empty_is_not_found() {
        let store = SqliteStore::open_in_memory().unwrap();
        let err = store.search_properties(&Query::namespace("bar-section")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_search_returns_latest_revision_per_identity() {
        let store = SqliteStore::open_in_memory().unwrap();

        store.insert_property(sample_property("foo", "client-test", &["foo-2"])).unwrap();
        let mut next = sample_property("foo", "client-test", &["value1", "value20"]);
        next.revision = 1;
        store.insert_property(next).unwrap();
        store.insert_property(sample_property("bar", "client-test", &["x"])).unwrap();
        store.insert_property(sample_property("baz", "elsewhere", &["y"])).unwrap();

        let found = store.search_properties(&Query::namespace("client-test")).unwrap();
        assert_eq!(found.len(), 2);

        let foo = found.iter().find(|p| p.key == "foo").unwrap();
        assert_eq!(foo.revision, 1);
        assert_eq!(foo.values.len(), 2);
        assert_eq!(foo.values[1].data, "value20");
        assert!(found.iter().any(|p| p.key == "bar"));
    }

    #[test]
    fn test_search_by_revision_returns_history() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_property(sample_property("foo", "ns", &["old"])).unwrap();
        let mut next = sample_property("foo", "ns", &["new"]);
        next.revision = 1;
        store.insert_property(next).unwrap();

        let mut template = sample_property("foo", "ns", &[]);
        template.revision = 1;
        let found = store.search_properties(&Query::new(template)).unwrap();
        assert_eq!(found[0].values[0].data, "new");
    }

    #[test]
    fn test_limit_truncates_properties_not_rows() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_property(sample_property("a", "ns", &["1", "2"])).unwrap();
        store.insert_property(sample_property("b", "ns", &["3", "4"])).unwrap();

        let found = store.search_properties(&Query::namespace("ns").with_limit(1)).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].values.len(), 2);
    }

    #[test]
    fn test_ignore_value_does_not_change_predicates() {
        let template = sample_property("foo", "ns", &["v"]);
        let (plain, plain_values) = build_search_sql(&Query::new(template.clone()));
        let (ignoring, ignoring_values) = build_search_sql(&Query::new(template).ignoring_value());
        assert_eq!(plain, ignoring);
        assert_eq!(plain_values, ignoring_values);
        assert!(plain.contains("key = ? AND namespace = ?"));
        assert!(!plain.contains("value ="));
    }

    #[test]
    fn test_build_sql_without_template() {
        let (sql, values) = build_search_sql(&Query::default());
        assert!(!sql.contains("WHERE"));
        assert!(sql.ends_with("value_order"));
        assert!(values.is_empty());
    }

    #[test]
    fn test_grouping_does_not_depend_on_adjacency() {
        let created = "2026-01-01T00:00:00Z";
        let rows = vec![
            raw("a", "a0", 0, 0, created),
            raw("b", "b0", 0, 0, created),
            raw("a", "a1", 1, 0, created),
            raw("b", "b1", 1, 0, created),
        ];

        let properties = group_rows(rows).unwrap();
        assert_eq!(properties.len(), 2);
        assert_eq!(properties[0].key, "a");
        let a: Vec<&str> = properties[0].values.iter().map(|v| v.data.as_str()).collect();
        assert_eq!(a, vec!["a0", "a1"]);
        let b: Vec<&str> = properties[1].values.iter().map(|v| v.data.as_str()).collect();
        assert_eq!(b, vec!["b0", "b1"]);
    }

    #[test]
    fn test_duplicate_revisions_are_not_merged() {
        let rows = vec![
            raw("a", "second", 0, 1, "2026-01-01T00:00:02Z"),
            raw("a", "first", 0, 1, "2026-01-01T00:00:01Z"),
        ];

        let properties = group_rows(rows).unwrap();
        assert_eq!(properties.len(), 1);
        assert_eq!(properties[0].values.len(), 1);
        assert_eq!(properties[0].values[0].data, "second");
    }

    #[test]
    fn test_concurrent_writers_same_revision_latest_created_wins() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_property(sample_property("foo", "ns", &["base"])).unwrap();

        // Both writers read revision 0 and persist revision 1
        let mut left = sample_property("foo", "ns", &["left-1", "left-2"]);
        left.revision = 1;
        let left = store.insert_property(left).unwrap();
        let mut right = sample_property("foo", "ns", &["right"]);
        right.revision = 1;
        let right = store.insert_property(right).unwrap();
        assert!(right.created > left.created);

        assert_eq!(store.count_rows().unwrap(), 4);
        let found = store.search_properties(&Query::namespace("ns")).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].revision, 1);
        assert_eq!(found[0].values.len(), 1);
        assert_eq!(found[0].values[0].data, "right");

        let history = store
            .search_properties(&Query::new(Property { revision: 1, ..Default::default() }))
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].values[0].data, "right");
    }

    #[test]
    fn test_corrupted_type_code_is_decode_error() {
        let mut row = raw("a", "x", 0, 0, "2026-01-01T00:00:00Z");
        row.value_type = 99;
        let err = group_rows(vec![row]).unwrap_err();
        assert!(matches!(err, Error::Decode(DecodeError::UnknownType(99))));
    }

    #[test]
    fn test_open_file_creates_table_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert_property(sample_property("foo", "ns", &["v"])).unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.count_rows().unwrap(), 1);
    }
}
