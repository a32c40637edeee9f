use log::{ debug, info };
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::cli::Args;
use crate::models::chat::Turn;

/// Process-wide, append-only log of conversation turns.
///
/// There is exactly one history shared by every request: clones share the same log.
/// `append` and `snapshot` are each atomic, but a request's snapshot-then-append sequence
/// is not, so two in-flight requests may read the same snapshot and interleave their
/// turns. That is acceptable for a single-user deployment and is the intended model.
///
/// When `max_turns` is set, the oldest turns are dropped once an append exceeds it.
#[derive(Clone, Debug, Default)]
pub struct ConversationStore {
    turns: Arc<Mutex<Vec<Turn>>>,
    max_turns: Option<usize>,
}

impl ConversationStore {
    pub fn new(max_turns: Option<usize>) -> Self {
        Self {
            turns: Arc::new(Mutex::new(Vec::new())),
            max_turns: max_turns.filter(|n| *n > 0),
        }
    }

    pub fn from_args(args: &Args) -> Self {
        match args.history_max_turns {
            Some(n) if n > 0 => info!("Conversation history capped at {} turns", n),
            _ => info!("Conversation history is unbounded"),
        }
        Self::new(args.history_max_turns)
    }

    pub async fn append(&self, turn: Turn) {
        let mut turns = self.turns.lock().await;
        debug!("Appending {} turn ({} chars)", turn.role, turn.content.len());
        turns.push(turn);

        if let Some(max) = self.max_turns {
            if turns.len() > max {
                let excess = turns.len() - max;
                turns.drain(..excess);
                debug!("Dropped {} oldest turn(s) from history", excess);
            }
        }
    }

    pub async fn snapshot(&self) -> Vec<Turn> {
        self.turns.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.turns.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.turns.lock().await.is_empty()
    }

    /// Empties the log and returns how many turns were removed.
    pub async fn clear(&self) -> usize {
        let mut turns = self.turns.lock().await;
        let removed = turns.len();
        turns.clear();
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::Role;

    #[tokio::test]
    async fn test_append_preserves_order() {
        let store = ConversationStore::new(None);
        store.append(Turn::user("one")).await;
        store.append(Turn::assistant("two")).await;
        store.append(Turn::user("three")).await;

        let snapshot = store.snapshot().await;
        let contents: Vec<&str> = snapshot.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
        assert_eq!(snapshot[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_snapshot_is_detached_from_later_appends() {
        let store = ConversationStore::new(None);
        store.append(Turn::user("first")).await;
        let snapshot = store.snapshot().await;
        store.append(Turn::assistant("second")).await;

        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_clones_share_one_log() {
        let store = ConversationStore::new(None);
        let other = store.clone();
        other.append(Turn::user("shared")).await;
        assert_eq!(store.snapshot().await, vec![Turn::user("shared")]);
    }

    #[tokio::test]
    async fn test_duplicates_are_kept() {
        let store = ConversationStore::new(None);
        store.append(Turn::user("same")).await;
        store.append(Turn::user("same")).await;
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_cap_drops_oldest_turns() {
        let store = ConversationStore::new(Some(2));
        store.append(Turn::user("a")).await;
        store.append(Turn::assistant("b")).await;
        store.append(Turn::user("c")).await;

        assert_eq!(store.snapshot().await, vec![Turn::assistant("b"), Turn::user("c")]);
    }

    #[tokio::test]
    async fn test_zero_cap_means_unbounded() {
        let store = ConversationStore::new(Some(0));
        for i in 0..5 {
            store.append(Turn::user(i.to_string())).await;
        }
        assert_eq!(store.len().await, 5);
    }

    #[tokio::test]
    async fn test_clear_empties_log() {
        let store = ConversationStore::new(None);
        store.append(Turn::user("x")).await;
        assert_eq!(store.clear().await, 1);
        assert!(store.is_empty().await);
    }
}
