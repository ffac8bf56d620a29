pub struct Icons;

impl Icons {
    pub const SERVER: &str = "🌍";
    pub const SEARCH: &str = "🔍";
    pub const STORED: &str = "✅";
    pub const FAILED: &str = "❌";
    pub const EMPTY: &str = "∅";
    pub const STATS: &str = "📊";
    pub const KEY: &str = "🔑";
    pub const IMPORT: &str = "📦";
}
