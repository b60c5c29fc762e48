/// Session-local board cache.
///
/// Holds the last reconciled board list, the open board, and the
/// loading/error side channels. It is a derived copy of the remote store and
/// may be discarded at any time.
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use crate::config::User;
use crate::types::{Board, BoardSummary, ColumnSummary, TaskSearchResult};

#[derive(Debug, Clone, Default)]
pub struct BoardCache {
    /// Identity the session is signed in as. Mutations read it on every call.
    pub(crate) user: Option<User>,
    pub(crate) boards: Vec<Board>,
    pub(crate) selected: Option<Board>,
    pub(crate) loading: bool,
    pub(crate) last_error: Option<String>,
    /// Bumped whenever the cache is cleared, so subscriptions started before
    /// the clear can tell their snapshots are stale.
    pub(crate) epoch: u64,
}

impl BoardCache {
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn boards(&self) -> &[Board] {
        &self.boards
    }

    pub fn board(&self, board_id: &str) -> Option<&Board> {
        self.boards.iter().find(|b| b.id == board_id)
    }

    pub fn selected_board(&self) -> Option<&Board> {
        self.selected.as_ref()
    }

    pub fn selected_board_id(&self) -> Option<&str> {
        self.selected.as_ref().map(|b| b.id.as_str())
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Swap in a freshly reconciled list. Never patched element by element.
    pub(crate) fn replace_boards(&mut self, boards: Vec<Board>) {
        self.boards = boards;
        self.loading = false;
    }

    pub(crate) fn record_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
    }

    /// Drop everything, e.g. on sign-out.
    pub(crate) fn clear(&mut self) {
        self.user = None;
        self.boards.clear();
        self.selected = None;
        self.loading = false;
        self.last_error = None;
        self.epoch += 1;
    }

    /// List entries for every cached board, in cache order.
    pub fn summaries(&self) -> Vec<BoardSummary> {
        self.boards
            .iter()
            .map(|board| BoardSummary {
                id: board.id.clone(),
                name: board.name.clone(),
                color: board.color.clone(),
                description: board.description.clone(),
                columns: board
                    .columns
                    .iter()
                    .map(|col| ColumnSummary {
                        id: col.id.clone(),
                        title: col.title.clone(),
                        task_count: col.tasks.len(),
                    })
                    .collect(),
                task_count: board.task_count(),
            })
            .collect()
    }

    /// Case-insensitive search over task titles and descriptions.
    pub fn search_tasks(&self, query: &str) -> Vec<TaskSearchResult> {
        let query_lower = query.trim().to_lowercase();
        if query_lower.is_empty() {
            return Vec::new();
        }

        let mut results = Vec::new();
        for board in &self.boards {
            for column in &board.columns {
                for task in &column.tasks {
                    let in_title = task.title.to_lowercase().contains(&query_lower);
                    let in_description = task
                        .description
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(&query_lower));
                    if in_title || in_description {
                        results.push(TaskSearchResult {
                            board_id: board.id.clone(),
                            board_name: board.name.clone(),
                            column_id: column.id.clone(),
                            column_title: column.title.clone(),
                            task_id: task.id.clone(),
                            task_title: task.title.clone(),
                        });
                    }
                }
            }
        }
        results
    }
}

/// Cloneable handle to one session's cache. Every change bumps a revision
/// counter observers can wait on.
#[derive(Clone)]
pub struct SharedCache {
    inner: Arc<Mutex<BoardCache>>,
    revision: Arc<watch::Sender<u64>>,
}

impl Default for SharedCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedCache {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(BoardCache::default())),
            revision: Arc::new(watch::channel(0).0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BoardCache> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read under the lock. The guard never escapes, so it cannot be held
    /// across an await.
    pub fn read<R>(&self, f: impl FnOnce(&BoardCache) -> R) -> R {
        f(&*self.lock())
    }

    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut BoardCache) -> R) -> R {
        let result = f(&mut *self.lock());
        self.revision.send_modify(|rev| *rev += 1);
        result
    }

    pub fn snapshot(&self) -> BoardCache {
        self.read(|cache| cache.clone())
    }

    /// Receiver that is notified after every cache change.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Column, Task};

    fn board(id: &str, tasks: &[(&str, &str)]) -> Board {
        Board {
            id: id.to_string(),
            name: format!("Board {}", id),
            color: "#667eea".to_string(),
            description: String::new(),
            owner_id: "u1".to_string(),
            members: vec!["u1".to_string()],
            created_at: None,
            updated_at: None,
            columns: vec![Column {
                id: "1".to_string(),
                title: "To do".to_string(),
                tasks: tasks
                    .iter()
                    .map(|(id, title)| Task {
                        id: id.to_string(),
                        title: title.to_string(),
                        description: None,
                        priority: Default::default(),
                        created_at: None,
                    })
                    .collect(),
            }],
        }
    }

    #[test]
    fn test_lookup_by_id() {
        let mut cache = BoardCache::default();
        cache.replace_boards(vec![board("a", &[]), board("b", &[])]);
        assert_eq!(cache.board("b").map(|b| b.name.as_str()), Some("Board b"));
        assert!(cache.board("c").is_none());
    }

    #[test]
    fn test_replace_clears_loading() {
        let mut cache = BoardCache {
            loading: true,
            ..BoardCache::default()
        };
        cache.replace_boards(Vec::new());
        assert!(!cache.is_loading());
    }

    #[test]
    fn test_clear_bumps_epoch() {
        let mut cache = BoardCache::default();
        cache.replace_boards(vec![board("a", &[])]);
        cache.record_error("boom");
        cache.user = Some(User::new("u1"));
        cache.clear();
        assert!(cache.user().is_none());
        assert!(cache.boards().is_empty());
        assert!(cache.last_error().is_none());
        assert_eq!(cache.epoch, 1);
    }

    #[test]
    fn test_summaries_count_tasks() {
        let mut cache = BoardCache::default();
        cache.replace_boards(vec![board("a", &[("t1", "One"), ("t2", "Two")])]);
        let summaries = cache.summaries();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].task_count, 2);
        assert_eq!(summaries[0].columns[0].task_count, 2);
    }

    #[test]
    fn test_search_tasks() {
        let mut cache = BoardCache::default();
        cache.replace_boards(vec![
            board("a", &[("t1", "Buy groceries")]),
            board("b", &[("t2", "Walk the dog")]),
        ]);

        let results = cache.search_tasks("GROCER");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].board_id, "a");
        assert_eq!(results[0].task_id, "t1");

        assert!(cache.search_tasks("   ").is_empty());
        assert!(cache.search_tasks("nonexistent").is_empty());
    }

    #[test]
    fn test_shared_cache_notifies() {
        let shared = SharedCache::new();
        let rx = shared.changes();
        shared.update(|c| c.record_error("x"));
        assert_eq!(*rx.borrow(), 1);
        assert_eq!(shared.read(|c| c.last_error().map(String::from)), Some("x".to_string()));
    }
}
