use crate::analytics::client::{clamp_days, PageviewQuery, DEFAULT_DAYS};
use crate::error::{StoreError, StoreResult};
use deadpool_sqlite::Pool;
use moka::sync::Cache;
use rusqlite::params;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

pub const GROUP_PLAUSIBLE: &str = "plausible";
pub const GROUP_PODCAST: &str = "podcast";
pub const GROUP_TOP_POSTS: &str = "top_posts";

pub const DEFAULT_ENDPOINT: &str = "https://plausible.io/api/v2/query";
pub const DEFAULT_HEADING: &str = "Most read";
/// Stands in for the API key on read-back. Sending it back keeps the stored key.
pub const REDACTED: &str = "********";

/// Grouped key-value settings repository.
#[async_trait::async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, group: &str, key: &str) -> StoreResult<Option<String>>;
    async fn set(&self, group: &str, key: &str, value: &str) -> StoreResult<()>;
    async fn group(&self, group: &str) -> StoreResult<HashMap<String, String>>;
}

/// SQLite-backed settings with an in-memory read-through cache per group.
pub struct SqliteSettingsStore {
    pool: Pool,
    groups: Cache<String, HashMap<String, String>>,
}

impl SqliteSettingsStore {
    pub fn new(pool: Pool, ttl_secs: u64) -> Self {
        Self {
            pool,
            groups: Cache::builder()
                .time_to_live(Duration::from_secs(ttl_secs))
                .max_capacity(16)
                .build(),
        }
    }
}

#[async_trait::async_trait]
impl SettingsStore for SqliteSettingsStore {
    async fn get(&self, group: &str, key: &str) -> StoreResult<Option<String>> {
        Ok(self.group(group).await?.get(key).cloned())
    }

    async fn set(&self, group: &str, key: &str, value: &str) -> StoreResult<()> {
        let conn = self.pool.get().await?;
        let (grp, k, v) = (group.to_string(), key.to_string(), value.to_string());
        let now = chrono::Utc::now().timestamp_millis();

        conn.interact(move |conn| {
            conn.execute(
                "INSERT INTO settings (grp, key, value, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (grp, key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at",
                params![grp, k, v, now],
            )
        })
        .await??;

        self.groups.invalidate(group);
        Ok(())
    }

    async fn group(&self, group: &str) -> StoreResult<HashMap<String, String>> {
        if let Some(cached) = self.groups.get(group) {
            return Ok(cached);
        }

        let conn = self.pool.get().await?;
        let grp = group.to_string();
        let values = conn
            .interact(move |conn| {
                let mut stmt = conn.prepare("SELECT key, value FROM settings WHERE grp = ?1")?;
                let rows = stmt
                    .query_map(params![grp], |row| {
                        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                    })?
                    .collect::<Result<HashMap<_, _>, _>>()?;
                Ok::<_, rusqlite::Error>(rows)
            })
            .await
            .map_err(StoreError::from)??;

        self.groups.insert(group.to_string(), values.clone());
        Ok(values)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlausibleSettings {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub site_id: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_days")]
    pub days: u32,
}

impl Default for PlausibleSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            site_id: String::new(),
            endpoint: default_endpoint(),
            days: DEFAULT_DAYS,
        }
    }
}

impl PlausibleSettings {
    /// The query to run, or `None` when the API key or site is missing.
    pub fn query(&self) -> Option<PageviewQuery> {
        if self.api_key.is_empty() || self.site_id.is_empty() || self.endpoint.is_empty() {
            return None;
        }
        Some(PageviewQuery {
            endpoint: self.endpoint.clone(),
            api_key: self.api_key.clone(),
            site_id: self.site_id.clone(),
            days: clamp_days(self.days),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodcastSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub heading: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub url: String,
}

impl PodcastSettings {
    /// A promo block needs at least a title and a link.
    pub fn is_displayable(&self) -> bool {
        self.enabled && !self.title.is_empty() && !self.url.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopPostsSettings {
    #[serde(default = "default_heading")]
    pub heading: String,
}

impl Default for TopPostsSettings {
    fn default() -> Self {
        Self {
            heading: default_heading(),
        }
    }
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}
fn default_days() -> u32 {
    DEFAULT_DAYS
}
fn default_heading() -> String {
    DEFAULT_HEADING.to_string()
}

/// All settings groups as one record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub plausible: PlausibleSettings,
    #[serde(default)]
    pub podcast: PodcastSettings,
    #[serde(default)]
    pub top_posts: TopPostsSettings,
}

impl Settings {
    /// Read every group; missing keys fall back to defaults.
    pub async fn load(store: &dyn SettingsStore) -> StoreResult<Self> {
        Ok(Self {
            plausible: from_group(store.group(GROUP_PLAUSIBLE).await?)?,
            podcast: from_group(store.group(GROUP_PODCAST).await?)?,
            top_posts: from_group(store.group(GROUP_TOP_POSTS).await?)?,
        })
    }

    pub async fn save(&self, store: &dyn SettingsStore) -> StoreResult<()> {
        for (group, values) in [
            (GROUP_PLAUSIBLE, to_group(&self.plausible)?),
            (GROUP_PODCAST, to_group(&self.podcast)?),
            (GROUP_TOP_POSTS, to_group(&self.top_posts)?),
        ] {
            for (key, value) in values {
                store.set(group, &key, &value).await?;
            }
        }
        Ok(())
    }

    /// Copy with the API key masked, for admin read-back.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.plausible.api_key.is_empty() {
            copy.plausible.api_key = REDACTED.to_string();
        }
        copy
    }
}

/// Values are stored as JSON scalars so numbers and booleans round-trip.
fn from_group<T: serde::de::DeserializeOwned>(values: HashMap<String, String>) -> StoreResult<T> {
    let map: serde_json::Map<String, serde_json::Value> = values
        .into_iter()
        .map(|(k, v)| {
            let parsed = serde_json::from_str(&v).unwrap_or(serde_json::Value::String(v));
            (k, parsed)
        })
        .collect();
    Ok(serde_json::from_value(serde_json::Value::Object(map))?)
}

fn to_group<T: Serialize>(value: &T) -> StoreResult<Vec<(String, String)>> {
    match serde_json::to_value(value)? {
        serde_json::Value::Object(map) => Ok(map
            .into_iter()
            .map(|(k, v)| (k, v.to_string()))
            .collect()),
        _ => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_round_trip_keeps_types() {
        let podcast = PodcastSettings {
            enabled: true,
            heading: "Listen".into(),
            title: "Weekly".into(),
            description: String::new(),
            image_url: String::new(),
            url: "https://example.org/podcast".into(),
        };
        let stored: HashMap<String, String> = to_group(&podcast).unwrap().into_iter().collect();
        assert_eq!(stored.get("enabled").map(String::as_str), Some("true"));
        let back: PodcastSettings = from_group(stored).unwrap();
        assert_eq!(back, podcast);
    }

    #[test]
    fn test_missing_group_uses_defaults() {
        let plausible: PlausibleSettings = from_group(HashMap::new()).unwrap();
        assert_eq!(plausible.days, DEFAULT_DAYS);
        assert_eq!(plausible.endpoint, DEFAULT_ENDPOINT);
        assert!(plausible.query().is_none());
    }

    #[test]
    fn test_unquoted_legacy_value_read_as_string() {
        let mut raw = HashMap::new();
        raw.insert("heading".to_string(), "Meest gelezen".to_string());
        let top: TopPostsSettings = from_group(raw).unwrap();
        assert_eq!(top.heading, "Meest gelezen");
    }

    #[test]
    fn test_query_clamps_days() {
        let plausible = PlausibleSettings {
            api_key: "key".into(),
            site_id: "example.org".into(),
            endpoint: DEFAULT_ENDPOINT.into(),
            days: 90,
        };
        assert_eq!(plausible.query().unwrap().days, 30);
    }

    #[test]
    fn test_redacted_masks_api_key() {
        let mut settings = Settings::default();
        settings.plausible.api_key = "secret".into();
        assert_eq!(settings.redacted().plausible.api_key, "********");
        assert_eq!(Settings::default().redacted().plausible.api_key, "");
    }

    #[test]
    fn test_podcast_displayable_requires_title_and_url() {
        let mut podcast = PodcastSettings {
            enabled: true,
            ..Default::default()
        };
        assert!(!podcast.is_displayable());
        podcast.title = "Weekly".into();
        podcast.url = "https://example.org/p".into();
        assert!(podcast.is_displayable());
        podcast.enabled = false;
        assert!(!podcast.is_displayable());
    }
}
