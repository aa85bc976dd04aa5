use crate::error::{StoreError, StoreResult};
use crate::types::RankedList;
use deadpool_sqlite::Pool;
use moka::sync::Cache;
use rusqlite::{params, OptionalExtension};
use std::sync::Arc;
use tokio::sync::Mutex;

pub const TOP_POSTS_KEY: &str = "top_posts";

/// Holds the single ranked list read by rendering.
#[async_trait::async_trait]
pub trait RankedListCache: Send + Sync {
    /// `None` when no refresh has ever stored a list.
    async fn load(&self) -> StoreResult<Option<Arc<RankedList>>>;
    /// Replace the stored list wholesale.
    async fn store(&self, list: &RankedList) -> StoreResult<()>;
}

/// SQLite row under [`TOP_POSTS_KEY`], fronted by an in-memory copy so page
/// renders never touch the database after the first read.
///
/// Writes are serialised and run on a detached task: the row and the front
/// always change together, even if the caller is dropped mid-store.
pub struct SqliteRankedListCache {
    pool: Pool,
    front: Cache<&'static str, Arc<RankedList>>,
    write_lock: Arc<Mutex<()>>,
}

impl SqliteRankedListCache {
    pub fn new(pool: Pool) -> Self {
        Self {
            pool,
            front: Cache::builder().max_capacity(1).build(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }
}

async fn read_row(pool: &Pool) -> StoreResult<Option<RankedList>> {
    let conn = pool.get().await?;
    let raw: Option<String> = conn
        .interact(|conn| {
            conn.query_row(
                "SELECT value FROM cache_entries WHERE key = ?1",
                params![TOP_POSTS_KEY],
                |row| row.get(0),
            )
            .optional()
        })
        .await
        .map_err(StoreError::from)??;

    match raw {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

async fn write_row(pool: &Pool, value: String, updated_at: i64) -> StoreResult<()> {
    let conn = pool.get().await?;
    conn.interact(move |conn| {
        conn.execute(
            "INSERT INTO cache_entries (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at",
            params![TOP_POSTS_KEY, value, updated_at],
        )
    })
    .await??;
    Ok(())
}

#[async_trait::async_trait]
impl RankedListCache for SqliteRankedListCache {
    async fn load(&self) -> StoreResult<Option<Arc<RankedList>>> {
        if let Some(list) = self.front.get(TOP_POSTS_KEY) {
            return Ok(Some(list));
        }

        // A miss waits for any in-flight store so it never re-caches an old row
        let _guard = self.write_lock.lock().await;
        if let Some(list) = self.front.get(TOP_POSTS_KEY) {
            return Ok(Some(list));
        }

        let Some(list) = read_row(&self.pool).await? else {
            return Ok(None);
        };
        let list = Arc::new(list);
        self.front.insert(TOP_POSTS_KEY, list.clone());
        Ok(Some(list))
    }

    async fn store(&self, list: &RankedList) -> StoreResult<()> {
        let value = serde_json::to_string(list)?;
        let updated_at = list.refreshed_at;
        let list = Arc::new(list.clone());

        let pool = self.pool.clone();
        let front = self.front.clone();
        let write_lock = self.write_lock.clone();

        tokio::spawn(async move {
            let _guard = write_lock.lock().await;
            front.invalidate(TOP_POSTS_KEY);
            write_row(&pool, value, updated_at).await?;
            front.insert(TOP_POSTS_KEY, list);
            Ok::<_, StoreError>(())
        })
        .await
        .map_err(|e| StoreError::Interact(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::storage::sqlite;
    use crate::types::RankedArticle;

    async fn test_pool(dir: &tempfile::TempDir) -> Pool {
        let pool = sqlite::create_pool(&DatabaseConfig {
            path: dir.path().join("recirc.db"),
            pool_size: 4,
        })
        .unwrap();
        sqlite::init_pool(&pool).await.unwrap();
        pool
    }

    fn list(marker: i64) -> RankedList {
        RankedList {
            articles: vec![RankedArticle::unresolved(format!("/news/{marker}/"), 10)],
            refreshed_at: marker,
        }
    }

    /// What a fresh process would see on startup.
    async fn durable(pool: &Pool) -> Option<RankedList> {
        SqliteRankedListCache::new(pool.clone())
            .load()
            .await
            .unwrap()
            .map(|l| l.as_ref().clone())
    }

    #[tokio::test]
    async fn test_store_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let pool = test_pool(&dir).await;
        let cache = SqliteRankedListCache::new(pool.clone());

        assert!(cache.load().await.unwrap().is_none());
        cache.store(&list(1)).await.unwrap();
        cache.store(&list(2)).await.unwrap();

        assert_eq!(cache.load().await.unwrap().as_deref(), Some(&list(2)));
        assert_eq!(durable(&pool).await, Some(list(2)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_overlapping_stores_agree_with_database() {
        let dir = tempfile::tempdir().unwrap();
        let pool = test_pool(&dir).await;
        let cache = Arc::new(SqliteRankedListCache::new(pool.clone()));

        let writers: Vec<_> = (1..=16)
            .map(|marker| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.store(&list(marker)).await.unwrap() })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap();
        }

        let served = cache.load().await.unwrap().map(|l| l.as_ref().clone());
        assert!(served.is_some());
        assert_eq!(served, durable(&pool).await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_dropped_store_still_updates_both_layers() {
        let dir = tempfile::tempdir().unwrap();
        let pool = test_pool(&dir).await;
        let cache = Arc::new(SqliteRankedListCache::new(pool.clone()));
        cache.store(&list(1)).await.unwrap();

        let writer = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.store(&list(2)).await })
        };
        tokio::task::yield_now().await;
        writer.abort();

        // Let any detached write settle
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        let served = cache.load().await.unwrap().map(|l| l.as_ref().clone());
        assert_eq!(served, durable(&pool).await);
    }
}
