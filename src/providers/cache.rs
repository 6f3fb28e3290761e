//! Cache-marker window.
//!
//! The reasoning service honours only a handful of cache breakpoints per
//! request. Markers are added to new turns as the conversation grows; before
//! every call the oldest ones are stripped so that at most
//! [`MAX_CACHE_MARKERS`] remain. Conversations are append-only, so document
//! order is insertion order.

use crate::session::Message;

/// Markers kept active after pruning.
pub const MAX_CACHE_MARKERS: usize = 3;

/// Count cache markers across the whole conversation.
pub fn count_cache_markers(conversation: &[Message]) -> usize {
    conversation.iter().map(Message::cache_marker_count).sum()
}

/// Remove all but the `keep` most recent cache markers. Returns how many
/// markers were removed. Running it twice is a no-op the second time.
pub fn prune_cache_markers(conversation: &mut [Message], keep: usize) -> usize {
    let total = count_cache_markers(conversation);
    if total <= keep {
        return 0;
    }

    let mut to_remove = total - keep;
    let removed = to_remove;
    'outer: for message in conversation.iter_mut() {
        for block in message.content.iter_mut() {
            if to_remove == 0 {
                break 'outer;
            }
            let marker = block.cache_control_mut();
            if marker.is_some() {
                *marker = None;
                to_remove -= 1;
            }
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{ContentBlock, Role};

    fn marked(text: &str) -> Message {
        Message::with_blocks(Role::Assistant, vec![ContentBlock::text(text).cached()])
    }

    fn marked_texts(conversation: &[Message]) -> Vec<String> {
        conversation
            .iter()
            .flat_map(|m| m.content.iter())
            .filter(|b| b.cache_control().is_some())
            .filter_map(|b| b.as_text().map(str::to_string))
            .collect()
    }

    #[test]
    fn test_prune_under_limit_is_unchanged() {
        let mut conversation = vec![marked("a"), Message::user("q"), marked("b"), marked("c")];
        let before = conversation.clone();
        assert_eq!(prune_cache_markers(&mut conversation, MAX_CACHE_MARKERS), 0);
        assert_eq!(conversation, before);
    }

    #[test]
    fn test_prune_five_keeps_three_most_recent() {
        let mut conversation: Vec<Message> =
            ["1", "2", "3", "4", "5"].iter().map(|t| marked(t)).collect();
        assert_eq!(prune_cache_markers(&mut conversation, MAX_CACHE_MARKERS), 2);
        assert_eq!(marked_texts(&conversation), vec!["3", "4", "5"]);
        // Content and order untouched.
        let texts: Vec<_> = conversation.iter().map(Message::text).collect();
        assert_eq!(texts, vec!["1", "2", "3", "4", "5"]);
    }

    #[test]
    fn test_prune_is_idempotent() {
        let mut conversation: Vec<Message> = (0..7).map(|i| marked(&i.to_string())).collect();
        prune_cache_markers(&mut conversation, MAX_CACHE_MARKERS);
        let once = conversation.clone();
        assert_eq!(prune_cache_markers(&mut conversation, MAX_CACHE_MARKERS), 0);
        assert_eq!(conversation, once);
        assert_eq!(count_cache_markers(&conversation), 3);
    }

    #[test]
    fn test_prune_within_a_single_turn() {
        let mut conversation = vec![Message::with_blocks(
            Role::Assistant,
            vec![
                ContentBlock::text("a").cached(),
                ContentBlock::text("b").cached(),
                ContentBlock::text("c").cached(),
                ContentBlock::text("d").cached(),
            ],
        )];
        prune_cache_markers(&mut conversation, MAX_CACHE_MARKERS);
        assert_eq!(marked_texts(&conversation), vec!["b", "c", "d"]);
    }
}
