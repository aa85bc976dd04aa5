use crate::error::StoreResult;
use crate::types::{ContentRef, RankedArticle};
use std::collections::HashMap;
use std::sync::Arc;

/// Batch lookup of published articles by slug.
#[async_trait::async_trait]
pub trait ContentDirectory: Send + Sync {
    /// Published articles matching any of `slugs`, keyed by slug. Unknown
    /// slugs are simply absent from the map.
    async fn lookup_slugs(&self, slugs: &[String]) -> StoreResult<HashMap<String, ContentRef>>;
}

/// Resolves ranked page paths to content identities with a single batch lookup.
pub struct IdentityResolver {
    directory: Arc<dyn ContentDirectory>,
}

impl IdentityResolver {
    pub fn new(directory: Arc<dyn ContentDirectory>) -> Self {
        Self { directory }
    }

    /// Fill `content_id`, `title` and `permalink` for each article, keeping order.
    pub async fn resolve(&self, articles: Vec<RankedArticle>) -> StoreResult<Vec<RankedArticle>> {
        if articles.is_empty() {
            return Ok(articles);
        }

        let slugs: Vec<String> = articles
            .iter()
            .filter_map(|a| slug_from_path(&a.path))
            .map(str::to_string)
            .collect();
        let found = self.directory.lookup_slugs(&slugs).await?;

        let mut unresolved = 0usize;
        let resolved = articles
            .into_iter()
            .map(|mut article| {
                match slug_from_path(&article.path).and_then(|slug| found.get(slug)) {
                    Some(content) => {
                        article.content_id = Some(content.id);
                        article.title = Some(content.title.clone());
                        article.permalink = Some(content.permalink.clone());
                    }
                    None => {
                        unresolved += 1;
                        article.content_id = None;
                    }
                }
                article
            })
            .collect();

        if unresolved > 0 {
            tracing::debug!(unresolved, "some ranked paths have no published article");
        }
        Ok(resolved)
    }
}

/// Last non-empty path segment, ignoring any query string or fragment.
pub fn slug_from_path(path: &str) -> Option<&str> {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    path.split('/').filter(|s| !s.is_empty()).next_back()
}
