use rand::Rng;

/// A recirculation block that may appear under an article.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Block {
    TopPosts,
    Podcast,
}

/// Which block to hide after page load. With both present one is hidden at
/// random (p = 0.5); with one or none present nothing is hidden.
pub fn choose_hidden<R: Rng + ?Sized>(rng: &mut R, top_posts: bool, podcast: bool) -> Option<Block> {
    if !(top_posts && podcast) {
        return None;
    }
    if rng.gen_bool(0.5) {
        Some(Block::TopPosts)
    } else {
        Some(Block::Podcast)
    }
}

/// The host's "related article" block duplicates the recommendation when it
/// points at an article already visible in the top posts list.
pub fn related_is_duplicate(related_id: Option<i64>, visible_ids: &[i64]) -> bool {
    related_id.is_some_and(|id| visible_ids.contains(&id))
}
