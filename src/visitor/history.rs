use std::collections::HashSet;

pub const COOKIE_NAME: &str = "visited_posts";
pub const COOKIE_EXPIRY_DAYS: u32 = 7;

/// Article ids a visitor has already seen, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisitorHistory {
    ids: Vec<i64>,
}

impl VisitorHistory {
    /// Parse the comma-joined cookie value. Garbage entries and repeats are dropped.
    pub fn parse(value: &str) -> Self {
        let mut history = Self::default();
        for part in value.split(',') {
            if let Ok(id) = part.trim().parse::<i64>() {
                if id > 0 {
                    history.record(id);
                }
            }
        }
        history
    }

    /// Append `id` unless it is already present. Returns whether it was added.
    pub fn record(&mut self, id: i64) -> bool {
        if self.ids.contains(&id) {
            return false;
        }
        self.ids.push(id);
        true
    }

    pub fn contains(&self, id: i64) -> bool {
        self.ids.contains(&id)
    }

    pub fn ids(&self) -> &[i64] {
        &self.ids
    }

    pub fn to_cookie_value(&self) -> String {
        self.ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// `Set-Cookie` header value. The expiry restarts on every write.
    pub fn set_cookie_header(&self, expiry_days: u32, secure: bool) -> String {
        let secure_flag = if secure { "; Secure" } else { "" };
        let max_age = u64::from(expiry_days) * 86_400;
        format!(
            "{COOKIE_NAME}={}; SameSite=Lax; Path=/; Max-Age={max_age}{secure_flag}",
            self.to_cookie_value()
        )
    }
}

/// Browser-side second stage: which rendered items stay visible.
///
/// Visited items are hidden and only the first `min_visible` unseen ones are
/// kept. Returns `None` when fewer than `min_visible` remain, meaning the whole
/// block is removed.
pub fn visible_items(rendered: &[i64], history: &VisitorHistory, min_visible: usize) -> Option<Vec<i64>> {
    let mut seen = HashSet::new();
    let unseen: Vec<i64> = rendered
        .iter()
        .copied()
        .filter(|id| !history.contains(*id) && seen.insert(*id))
        .take(min_visible)
        .collect();

    (unseen.len() >= min_visible).then_some(unseen)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_drops_garbage_and_duplicates() {
        let history = VisitorHistory::parse("12, 7,abc,,12,-3,0,9");
        assert_eq!(history.ids(), &[12, 7, 9]);
    }

    #[test]
    fn test_repeat_visits_never_duplicate() {
        let mut history = VisitorHistory::default();
        for _ in 0..3 {
            history.record(5);
            history.record(8);
        }
        assert_eq!(history.to_cookie_value(), "5,8");

        let reparsed = VisitorHistory::parse(&history.to_cookie_value());
        assert_eq!(reparsed, history);
    }

    #[test]
    fn test_no_count_cap() {
        let mut history = VisitorHistory::default();
        for id in 1..=500 {
            history.record(id);
        }
        assert_eq!(history.ids().len(), 500);
    }

    #[test]
    fn test_set_cookie_header() {
        let history = VisitorHistory::parse("3,4");
        assert_eq!(
            history.set_cookie_header(7, true),
            "visited_posts=3,4; SameSite=Lax; Path=/; Max-Age=604800; Secure"
        );
        assert!(!history.set_cookie_header(7, false).contains("Secure"));
    }

    #[test]
    fn test_visible_items_hides_visited_and_caps() {
        let history = VisitorHistory::parse("2,4");
        let rendered = [1, 2, 3, 4, 5, 6, 7, 8];
        assert_eq!(visible_items(&rendered, &history, 5), Some(vec![1, 3, 5, 6, 7]));
    }

    #[test]
    fn test_visible_items_removes_block_when_too_few() {
        let history = VisitorHistory::parse("1,2");
        assert_eq!(visible_items(&[1, 2, 3, 4, 5, 6], &history, 5), None);
        assert_eq!(
            visible_items(&[1, 2, 3, 4, 5, 6, 7], &history, 5),
            Some(vec![3, 4, 5, 6, 7])
        );
    }
}
