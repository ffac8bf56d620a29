//! Database schema definitions

/// Name of the single append-only table
pub const PROPERTIES_TABLE: &str = "properties";

/// SQL to create the properties table.
/// One row per value; a property revision is the set of rows sharing
/// (key, namespace, environment, revision, created).
pub const CREATE_PROPERTIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS properties (
    key TEXT NOT NULL,
    value TEXT NULL,
    value_order INTEGER NOT NULL DEFAULT 0,
    value_type INTEGER NOT NULL DEFAULT 0,
    secret INTEGER NOT NULL DEFAULT 0,
    section TEXT NULL,
    namespace TEXT NOT NULL DEFAULT 'default',
    environment INTEGER NOT NULL DEFAULT 0,
    revision INTEGER NOT NULL DEFAULT 0,
    version TEXT NULL,
    created TEXT NOT NULL,
    deleted TEXT NULL
)
"#;

/// SQL to create indexes (lookup only, no uniqueness)
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_properties_identity ON properties(key, namespace, environment)",
    "CREATE INDEX IF NOT EXISTS idx_properties_namespace ON properties(namespace)",
    "CREATE INDEX IF NOT EXISTS idx_properties_revision ON properties(revision)",
];

/// Columns in the order every SELECT returns them
pub const COLUMNS: &str = "key, value, value_order, value_type, secret, section, namespace, environment, revision, version, created, deleted";

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![CREATE_PROPERTIES_TABLE];
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}
