use super::alternate::{choose_hidden, related_is_duplicate, Block};
use super::history::{visible_items, VisitorHistory};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// What the browser script found on the page after load.
#[derive(Debug, Clone, Deserialize)]
pub struct VisitReport {
    pub post_id: i64,
    /// `data-post-id` of each top posts item, in page order.
    #[serde(default)]
    pub rendered: Vec<i64>,
    #[serde(default)]
    pub min_visible: Option<usize>,
    #[serde(default)]
    pub podcast: bool,
    /// Target of the host's own related-article block, if any.
    #[serde(default)]
    pub related_id: Option<i64>,
}

/// DOM changes for the script to apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisitDecision {
    pub show_top_posts: bool,
    pub visible_ids: Vec<i64>,
    pub show_podcast: bool,
    pub remove_related: bool,
}

/// Apply the visited filter, the 50/50 block choice and the related-block
/// dedup, in that order. `history` is the cookie as it was before this visit.
pub fn decide<R: Rng + ?Sized>(
    rng: &mut R,
    history: &VisitorHistory,
    report: &VisitReport,
    default_min_visible: usize,
) -> VisitDecision {
    let min_visible = report.min_visible.unwrap_or(default_min_visible).max(1);
    let visible = if report.rendered.is_empty() {
        None
    } else {
        visible_items(&report.rendered, history, min_visible)
    };

    let hidden = choose_hidden(rng, visible.is_some(), report.podcast);
    let show_top_posts = visible.is_some() && hidden != Some(Block::TopPosts);
    let show_podcast = report.podcast && hidden != Some(Block::Podcast);
    let visible_ids = if show_top_posts {
        visible.unwrap_or_default()
    } else {
        Vec::new()
    };
    let remove_related = show_top_posts && related_is_duplicate(report.related_id, &visible_ids);

    VisitDecision {
        show_top_posts,
        visible_ids,
        show_podcast,
        remove_related,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn report(rendered: &[i64], podcast: bool, related_id: Option<i64>) -> VisitReport {
        VisitReport {
            post_id: 99,
            rendered: rendered.to_vec(),
            min_visible: None,
            podcast,
            related_id,
        }
    }

    #[test]
    fn test_top_posts_only_always_shown_and_trimmed() {
        let mut rng = StdRng::seed_from_u64(7);
        let history = VisitorHistory::parse("3");
        for _ in 0..50 {
            let d = decide(&mut rng, &history, &report(&[1, 2, 3, 4, 5, 6, 7], false, None), 5);
            assert!(d.show_top_posts);
            assert!(!d.show_podcast);
            assert_eq!(d.visible_ids, vec![1, 2, 4, 5, 6]);
        }
    }

    #[test]
    fn test_podcast_shown_when_top_posts_filtered_out() {
        let mut rng = StdRng::seed_from_u64(7);
        let history = VisitorHistory::parse("1,2,3");
        for _ in 0..50 {
            let d = decide(&mut rng, &history, &report(&[1, 2, 3, 4, 5, 6], true, None), 5);
            assert!(!d.show_top_posts);
            assert!(d.show_podcast);
            assert!(d.visible_ids.is_empty());
        }
    }

    #[test]
    fn test_exactly_one_block_when_both_present() {
        let mut rng = StdRng::seed_from_u64(11);
        let history = VisitorHistory::default();
        let mut podcast_shown = 0;
        for _ in 0..1000 {
            let d = decide(&mut rng, &history, &report(&[1, 2, 3, 4, 5], true, None), 5);
            assert!(d.show_top_posts ^ d.show_podcast);
            if d.show_podcast {
                podcast_shown += 1;
            }
        }
        assert!((450..=550).contains(&podcast_shown), "podcast shown {podcast_shown}/1000");
    }

    #[test]
    fn test_related_removed_only_when_duplicate_is_visible() {
        let mut rng = StdRng::seed_from_u64(3);
        let history = VisitorHistory::default();
        let d = decide(&mut rng, &history, &report(&[1, 2, 3, 4, 5, 6], false, Some(6)), 5);
        // 6 is rendered but trimmed beyond the first five
        assert!(!d.remove_related);
        let d = decide(&mut rng, &history, &report(&[1, 2, 3, 4, 5, 6], false, Some(2)), 5);
        assert!(d.remove_related);
    }

    #[test]
    fn test_nothing_rendered_nothing_shown() {
        let mut rng = StdRng::seed_from_u64(3);
        let d = decide(&mut rng, &VisitorHistory::default(), &report(&[], false, Some(2)), 5);
        assert_eq!(
            d,
            VisitDecision {
                show_top_posts: false,
                visible_ids: Vec::new(),
                show_podcast: false,
                remove_related: false,
            }
        );
    }
}
