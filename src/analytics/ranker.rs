use crate::types::{RankedArticle, RawPageStat};

pub const MAX_TOP_ARTICLES: usize = 25;

/// Filters raw page stats down to article pages and ranks them by views.
#[derive(Debug, Clone)]
pub struct ArticleRanker {
    sections: Vec<String>,
    max_articles: usize,
}

impl ArticleRanker {
    pub fn new(sections: Vec<String>, max_articles: usize) -> Self {
        Self {
            sections,
            max_articles,
        }
    }

    /// A path is eligible when it sits under a content section and is not the
    /// section index itself (`/news/` is excluded, `/news/x` is not).
    pub fn is_eligible(&self, path: &str) -> bool {
        self.sections
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()) && path.len() > prefix.len())
    }

    /// Eligible entries, most viewed first. Ties keep upstream order.
    pub fn rank(&self, stats: Vec<RawPageStat>) -> Vec<RankedArticle> {
        let mut ranked: Vec<RankedArticle> = stats
            .into_iter()
            .filter(|s| self.is_eligible(&s.path))
            .map(|s| RankedArticle::unresolved(s.path, s.pageviews))
            .collect();

        // `sort_by` is stable
        ranked.sort_by(|a, b| b.pageviews.cmp(&a.pageviews));
        ranked.truncate(self.max_articles);
        ranked
    }
}

impl Default for ArticleRanker {
    fn default() -> Self {
        Self::new(
            vec!["/news/".to_string(), "/background/".to_string()],
            MAX_TOP_ARTICLES,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn stat(path: &str, pageviews: u64) -> RawPageStat {
        RawPageStat {
            path: path.to_string(),
            pageviews,
        }
    }

    #[test]
    fn test_section_index_pages_excluded() {
        let ranker = ArticleRanker::default();
        let ranked = ranker.rank(vec![
            stat("/news/", 1000),
            stat("/background/", 900),
            stat("/news/flood-warning", 10),
        ]);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].path, "/news/flood-warning");
    }

    #[test]
    fn test_non_content_paths_excluded() {
        let ranker = ArticleRanker::default();
        let ranked = ranker.rank(vec![
            stat("/", 5000),
            stat("/contact", 300),
            stat("/newsletter/signup", 200),
            stat("/background/long-read", 50),
        ]);
        let paths: Vec<_> = ranked.iter().map(|a| a.path.as_str()).collect();
        assert_eq!(paths, vec!["/background/long-read"]);
    }

    #[test]
    fn test_prefix_length_is_per_matched_section() {
        // "/background/x" is longer than "/news/" but only the matched prefix counts
        let ranker = ArticleRanker::default();
        assert!(ranker.is_eligible("/background/x"));
        assert!(!ranker.is_eligible("/background/"));
    }

    #[test]
    fn test_sorted_descending_with_stable_ties() {
        let ranker = ArticleRanker::default();
        let ranked = ranker.rank(vec![
            stat("/news/b", 5),
            stat("/news/a", 20),
            stat("/news/c", 5),
            stat("/news/d", 5),
        ]);
        let paths: Vec<_> = ranked.iter().map(|a| a.path.as_str()).collect();
        assert_eq!(paths, vec!["/news/a", "/news/b", "/news/c", "/news/d"]);
    }

    #[test]
    fn test_truncates_to_max() {
        let ranker = ArticleRanker::default();
        let stats = (0..60).map(|i| stat(&format!("/news/{i}"), i)).collect();
        let ranked = ranker.rank(stats);
        assert_eq!(ranked.len(), MAX_TOP_ARTICLES);
        assert_eq!(ranked[0].pageviews, 59);
        assert!(ranked.iter().all(|a| a.content_id.is_none()));
    }

    proptest! {
        #[test]
        fn prop_output_sorted_and_bounded(
            rows in proptest::collection::vec(
                (prop_oneof![Just("/news/"), Just("/background/"), Just("/other/")], "[a-z]{0,6}", 0u64..500),
                0..120,
            )
        ) {
            let ranker = ArticleRanker::default();
            let stats = rows
                .into_iter()
                .map(|(prefix, slug, views)| stat(&format!("{prefix}{slug}"), views))
                .collect();
            let ranked = ranker.rank(stats);
            prop_assert!(ranked.len() <= MAX_TOP_ARTICLES);
            prop_assert!(ranked.windows(2).all(|w| w[0].pageviews >= w[1].pageviews));
            prop_assert!(ranked.iter().all(|a| a.path != "/news/" && a.path != "/background/"));
            prop_assert!(ranked.iter().all(|a| !a.path.starts_with("/other/")));
        }
    }
}
