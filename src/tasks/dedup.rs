use std::collections::HashSet;

use crate::domain::Post;

/// Most posts kept in history. Anything older falls off on merge.
pub const HISTORY_CAP: usize = 100;

/// Posts from `fresh` whose permalink is not in `history`, in input order.
///
/// Permalinks compare as exact strings. A permalink repeated within `fresh`
/// is kept only the first time.
pub fn dedupe(fresh: &[Post], history: &[Post]) -> Vec<Post> {
    let mut seen: HashSet<&str> = history.iter().map(|p| p.permalink.as_str()).collect();
    fresh
        .iter()
        .filter(|post| seen.insert(post.permalink.as_str()))
        .cloned()
        .collect()
}

/// Fresh posts followed by history, newest first, cut to [`HISTORY_CAP`].
/// Equal timestamps keep their input order, so fresh posts win ties.
pub fn merge_and_cap(fresh: Vec<Post>, history: Vec<Post>) -> Vec<Post> {
    let mut merged = fresh;
    merged.extend(history);
    merged.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    merged.truncate(HISTORY_CAP);
    merged
}
