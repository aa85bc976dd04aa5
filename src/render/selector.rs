use crate::types::{PageContext, RankedArticle, RankedList};
use std::collections::HashSet;

pub const MIN_POSTS_DISPLAY: usize = 5;

/// Which pages get a recirculation block at all.
#[derive(Debug, Clone, Default)]
pub struct EligibilityGate {
    excluded_categories: Vec<String>,
}

impl EligibilityGate {
    pub fn new(excluded_categories: Vec<String>) -> Self {
        Self {
            excluded_categories,
        }
    }

    /// Single, standard-article views outside excluded categories. API and
    /// other programmatic requests never qualify.
    pub fn allows(&self, page: &PageContext) -> bool {
        page.is_single
            && page.post_type == "post"
            && !page.is_api_request
            && page.post_id > 0
            && !page
                .categories
                .iter()
                .any(|c| self.excluded_categories.iter().any(|x| x.eq_ignore_ascii_case(c)))
    }
}

/// Per-request decision for the top posts block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    NotEligiblePage,
    NoCachedData,
    Suppressed { remaining: usize },
    /// Every remaining article in ranked order; the browser trims per visitor.
    Rendering(Vec<RankedArticle>),
}

impl Selection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Selection::NotEligiblePage => "not_eligible_page",
            Selection::NoCachedData => "no_cached_data",
            Selection::Suppressed { .. } => "suppressed",
            Selection::Rendering(_) => "rendering",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PersonalizedSelector {
    gate: EligibilityGate,
    min_display: usize,
}

impl PersonalizedSelector {
    pub fn new(gate: EligibilityGate, min_display: usize) -> Self {
        Self { gate, min_display }
    }

    pub fn min_display(&self) -> usize {
        self.min_display
    }

    pub fn is_eligible(&self, page: &PageContext) -> bool {
        self.gate.allows(page)
    }

    pub fn select(&self, page: &PageContext, cached: Option<&RankedList>) -> Selection {
        if !self.gate.allows(page) {
            return Selection::NotEligiblePage;
        }

        let Some(list) = cached.filter(|l| !l.articles.is_empty()) else {
            tracing::warn!("no top post data available in cache");
            return Selection::NoCachedData;
        };

        let candidates = candidates_for(&list.articles, page.post_id);
        if candidates.len() < self.min_display {
            tracing::debug!(
                remaining = candidates.len(),
                post_id = page.post_id,
                "not enough top posts after excluding the current post"
            );
            return Selection::Suppressed {
                remaining: candidates.len(),
            };
        }

        Selection::Rendering(candidates)
    }
}

impl Default for PersonalizedSelector {
    fn default() -> Self {
        Self::new(EligibilityGate::default(), MIN_POSTS_DISPLAY)
    }
}

/// Resolved, linkable articles other than `current_id`, first occurrence of
/// each id only. Entries without a permalink cannot be rendered.
fn candidates_for(articles: &[RankedArticle], current_id: i64) -> Vec<RankedArticle> {
    let mut seen = HashSet::new();
    articles
        .iter()
        .filter(|a| a.permalink.is_some())
        .filter(|a| match a.resolved_id() {
            Some(id) => id != current_id && seen.insert(id),
            None => false,
        })
        .cloned()
        .collect()
}
