pub mod markup;
pub mod selector;

pub use selector::{EligibilityGate, PersonalizedSelector, Selection};

use crate::storage::{RankedListCache, Settings, SettingsStore};
use crate::types::PageContext;
use std::sync::Arc;

/// Markup appended under an article, plus what was decided for it.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub html: String,
    pub selection: Selection,
    pub podcast: bool,
}

/// Builds the recirculation fragment for one page view.
pub struct Renderer {
    selector: PersonalizedSelector,
    cache: Arc<dyn RankedListCache>,
    settings: Arc<dyn SettingsStore>,
    utm_source: String,
    public_url: String,
}

impl Renderer {
    pub fn new(
        selector: PersonalizedSelector,
        cache: Arc<dyn RankedListCache>,
        settings: Arc<dyn SettingsStore>,
        utm_source: String,
        public_url: String,
    ) -> Self {
        Self {
            selector,
            cache,
            settings,
            utm_source,
            public_url,
        }
    }

    /// Never fails: storage problems are logged and degrade to less markup.
    pub async fn fragment(&self, page: &PageContext) -> Fragment {
        if !self.selector.is_eligible(page) {
            // Visits to any single page still count toward the history
            let html = if page.is_single && page.post_id > 0 && !page.is_api_request {
                markup::tracker_script(&self.public_url, page.post_id)
            } else {
                String::new()
            };
            return Fragment {
                html,
                selection: Selection::NotEligiblePage,
                podcast: false,
            };
        }

        let cached = match self.cache.load().await {
            Ok(list) => list,
            Err(e) => {
                tracing::error!(error = %e, "failed to read ranked list cache");
                None
            }
        };
        let settings = match Settings::load(self.settings.as_ref()).await {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "failed to read settings, using defaults");
                Settings::default()
            }
        };

        let selection = self.selector.select(page, cached.as_deref());
        let mut html = String::new();

        if let Selection::Rendering(articles) = &selection {
            html.push_str(&markup::top_posts_block(
                &settings.top_posts.heading,
                articles,
                &self.utm_source,
                self.selector.min_display(),
            ));
        }

        let podcast = settings.podcast.is_displayable();
        if podcast {
            html.push_str(&markup::podcast_block(&settings.podcast));
        }

        html.push_str(&markup::tracker_script(&self.public_url, page.post_id));

        Fragment {
            html,
            selection,
            podcast,
        }
    }
}
