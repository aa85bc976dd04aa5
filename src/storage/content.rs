use crate::error::{StoreError, StoreResult};
use crate::identity::ContentDirectory;
use crate::types::ContentRef;
use deadpool_sqlite::Pool;
use rusqlite::params;
use serde::Deserialize;
use std::collections::HashMap;

/// Article record pushed by the CMS.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentUpsert {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub permalink: String,
    #[serde(default = "default_post_type")]
    pub post_type: String,
    #[serde(default = "default_status")]
    pub status: String,
}

fn default_post_type() -> String {
    "post".to_string()
}

fn default_status() -> String {
    "publish".to_string()
}

/// Content index in SQLite. Only published `post` rows resolve.
#[derive(Clone)]
pub struct SqliteContentDirectory {
    pool: Pool,
}

impl SqliteContentDirectory {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Insert or replace articles by id. Returns the number of rows written.
    pub async fn upsert(&self, items: Vec<ContentUpsert>) -> StoreResult<usize> {
        if items.is_empty() {
            return Ok(0);
        }
        let now = chrono::Utc::now().timestamp_millis();
        let conn = self.pool.get().await?;

        let written = conn
            .interact(move |conn| {
                let tx = conn.transaction()?;
                let mut written = 0usize;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO content (id, slug, title, permalink, post_type, status, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                         ON CONFLICT (id) DO UPDATE SET
                            slug = excluded.slug,
                            title = excluded.title,
                            permalink = excluded.permalink,
                            post_type = excluded.post_type,
                            status = excluded.status,
                            updated_at = excluded.updated_at",
                    )?;
                    for item in &items {
                        written += stmt.execute(params![
                            item.id,
                            item.slug,
                            item.title,
                            item.permalink,
                            item.post_type,
                            item.status,
                            now
                        ])?;
                    }
                }
                tx.commit()?;
                Ok::<_, rusqlite::Error>(written)
            })
            .await
            .map_err(StoreError::from)??;

        Ok(written)
    }
}

#[async_trait::async_trait]
impl ContentDirectory for SqliteContentDirectory {
    async fn lookup_slugs(&self, slugs: &[String]) -> StoreResult<HashMap<String, ContentRef>> {
        if slugs.is_empty() {
            return Ok(HashMap::new());
        }
        let slugs = slugs.to_vec();
        let conn = self.pool.get().await?;

        let found = conn
            .interact(move |conn| {
                let placeholders: Vec<String> =
                    (1..=slugs.len()).map(|i| format!("?{i}")).collect();
                // Newest id wins when two published posts share a slug
                let sql = format!(
                    "SELECT id, slug, title, permalink FROM content
                     WHERE status = 'publish' AND post_type = 'post' AND slug IN ({})
                     ORDER BY id ASC",
                    placeholders.join(",")
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(rusqlite::params_from_iter(slugs.iter()), |row| {
                    Ok(ContentRef {
                        id: row.get(0)?,
                        slug: row.get(1)?,
                        title: row.get(2)?,
                        permalink: row.get(3)?,
                    })
                })?;

                let mut found = HashMap::new();
                for row in rows {
                    let content = row?;
                    found.insert(content.slug.clone(), content);
                }
                Ok::<_, rusqlite::Error>(found)
            })
            .await
            .map_err(StoreError::from)??;

        Ok(found)
    }
}
