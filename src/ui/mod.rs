pub mod icons;
pub mod output;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{banner, error, field, stored, success};
pub use table::{properties_table, stats_table, PropertyRow};
pub use theme::{theme, Theme};
