pub mod content;
pub mod migrations;
pub mod ranked_cache;
pub mod settings;
pub mod sqlite;

pub use content::{ContentUpsert, SqliteContentDirectory};
pub use ranked_cache::{RankedListCache, SqliteRankedListCache};
pub use settings::{Settings, SettingsStore, SqliteSettingsStore};
