/// Board, column and task mutations.
///
/// Every operation reads the cached board fresh, computes the complete new
/// column list, and issues one whole-document write. The cache itself is
/// never touched by a mutation: changes become visible only when the store
/// pushes the next snapshot. Two mutations on the same board that overlap
/// in flight both start from the same cached state, so the later write
/// replaces the earlier one.
use std::sync::Arc;

use crate::cache::SharedCache;
use crate::codec;
use crate::config::{SyncConfig, User};
use crate::error::BoardError;
use crate::ids::IdGenerator;
use crate::ops;
use crate::selection;
use crate::store::{DocRef, RemoteStore};
use crate::types::{
    Board, BoardId, BoardPatch, Column, NewTask, Task, TaskPatch, DEFAULT_COLUMN_TITLES,
};

/// Mutation entry points for one session. Cheap to clone.
#[derive(Clone)]
pub struct MutationEngine {
    store: Arc<dyn RemoteStore>,
    cache: SharedCache,
    ids: Arc<dyn IdGenerator>,
    config: Arc<SyncConfig>,
}

impl MutationEngine {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        cache: SharedCache,
        ids: Arc<dyn IdGenerator>,
        config: Arc<SyncConfig>,
    ) -> Self {
        Self {
            store,
            cache,
            ids,
            config,
        }
    }

    /// The identity the session is signed in as right now.
    fn require_user(&self) -> Result<User, BoardError> {
        self.cache
            .read(|c| c.user().cloned())
            .ok_or(BoardError::NotAuthenticated)
    }

    fn doc_ref(&self, board_id: &str) -> DocRef {
        DocRef::new(self.config.collection.as_str(), board_id)
    }

    /// Clone the cached board, failing if the cache does not hold it.
    fn cached_board(&self, board_id: &str) -> Result<Board, BoardError> {
        self.cache
            .read(|c| c.board(board_id).cloned())
            .ok_or_else(|| BoardError::board_not_found(board_id))
    }

    /// Record a failure in `last_error` before handing it back.
    fn record<T>(&self, op: &str, result: Result<T, BoardError>) -> Result<T, BoardError> {
        if let Err(e) = &result {
            log::warn!("[taskboard.engine.{}] {}", op, e);
            let message = e.to_string();
            self.cache.update(|c| c.record_error(message));
        }
        result
    }

    /// Create a board with the three default columns. Returns the new
    /// document id without waiting for the snapshot that will carry it.
    pub async fn create_board(
        &self,
        name: &str,
        color: &str,
        description: &str,
    ) -> Result<BoardId, BoardError> {
        let result = self.create_board_inner(name, color, description).await;
        self.record("create_board", result)
    }

    async fn create_board_inner(
        &self,
        name: &str,
        color: &str,
        description: &str,
    ) -> Result<BoardId, BoardError> {
        let user = self.require_user()?;
        let name = name.trim();
        if name.is_empty() {
            return Err(BoardError::InvalidInput("board name is empty".to_string()));
        }
        let color = if color.trim().is_empty() {
            self.config.default_board_color.as_str()
        } else {
            color
        };

        let board = Board {
            id: String::new(),
            name: name.to_string(),
            color: color.to_string(),
            description: description.to_string(),
            owner_id: user.id.clone(),
            members: vec![user.id.clone()],
            created_at: Some(self.store.now()),
            updated_at: None,
            columns: DEFAULT_COLUMN_TITLES
                .iter()
                .enumerate()
                .map(|(i, title)| Column::empty((i + 1).to_string(), *title))
                .collect(),
        };

        let fields = codec::board_to_fields(&board)?;
        let board_id = self.store.create(&self.config.collection, fields).await?;
        log::info!(
            "[taskboard.engine.create_board] Created board {} for {}",
            board_id,
            user.id
        );
        Ok(board_id)
    }

    /// Merge-write the set fields of `patch` plus a fresh `updatedAt`.
    pub async fn update_board(&self, board_id: &str, patch: BoardPatch) -> Result<(), BoardError> {
        let result = self.update_board_inner(board_id, &patch).await;
        self.record("update_board", result)
    }

    async fn update_board_inner(&self, board_id: &str, patch: &BoardPatch) -> Result<(), BoardError> {
        self.require_user()?;
        if patch.columns.as_ref().is_some_and(Vec::is_empty) {
            return Err(BoardError::LastColumn);
        }
        let mut fields = codec::patch_to_fields(patch)?;
        fields.insert(
            "updatedAt".to_string(),
            codec::timestamp_to_value(self.store.now())?,
        );
        self.store.update(&self.doc_ref(board_id), fields).await?;
        log::debug!("[taskboard.engine.update_board] Wrote board {}", board_id);
        Ok(())
    }

    /// Replace the board's whole column list. An empty list is refused.
    pub async fn update_columns(&self, board_id: &str, columns: Vec<Column>) -> Result<(), BoardError> {
        let result = self
            .update_board_inner(board_id, &BoardPatch::columns(columns))
            .await;
        self.record("update_columns", result)
    }

    /// Delete the board document. Closes the board right away if it is open.
    pub async fn delete_board(&self, board_id: &str) -> Result<(), BoardError> {
        let result = match self.require_user() {
            Ok(_) => self
                .store
                .delete(&self.doc_ref(board_id))
                .await
                .map_err(BoardError::from),
            Err(e) => Err(e),
        };
        if result.is_ok() {
            self.cache
                .update(|c| selection::deselect_if_open(c, board_id));
            log::info!("[taskboard.engine.delete_board] Deleted board {}", board_id);
        }
        self.record("delete_board", result)
    }

    /// Append a task to a column. Returns the new task's id.
    pub async fn add_task(
        &self,
        board_id: &str,
        column_id: &str,
        new_task: NewTask,
    ) -> Result<String, BoardError> {
        let result = self.add_task_inner(board_id, column_id, new_task).await;
        self.record("add_task", result)
    }

    async fn add_task_inner(
        &self,
        board_id: &str,
        column_id: &str,
        new_task: NewTask,
    ) -> Result<String, BoardError> {
        let title = new_task.title.trim();
        if title.is_empty() {
            return Err(BoardError::InvalidInput("task title is empty".to_string()));
        }
        let task = Task {
            id: self.ids.next_id(),
            title: title.to_string(),
            description: new_task.description,
            priority: new_task.priority.unwrap_or(self.config.default_priority),
            created_at: Some(self.store.now()),
        };
        let task_id = task.id.clone();
        self.rewrite_columns(board_id, |columns| ops::add_task(columns, column_id, task))
            .await?;
        Ok(task_id)
    }

    pub async fn update_task(
        &self,
        board_id: &str,
        column_id: &str,
        task_id: &str,
        patch: TaskPatch,
    ) -> Result<(), BoardError> {
        let result = self
            .rewrite_columns(board_id, |columns| {
                ops::update_task(columns, column_id, task_id, &patch)
            })
            .await;
        self.record("update_task", result)
    }

    pub async fn delete_task(&self, board_id: &str, column_id: &str, task_id: &str) -> Result<(), BoardError> {
        let result = self
            .rewrite_columns(board_id, |columns| {
                ops::delete_task(columns, column_id, task_id)
            })
            .await;
        self.record("delete_task", result)
    }

    /// Reorder primitive behind drag and drop.
    pub async fn move_task(
        &self,
        board_id: &str,
        source_column_id: &str,
        dest_column_id: &str,
        task_id: &str,
        dest_index: usize,
    ) -> Result<(), BoardError> {
        log::debug!(
            "[taskboard.engine.move_task] {} {} -> {}[{}]",
            task_id,
            source_column_id,
            dest_column_id,
            dest_index
        );
        let result = self
            .rewrite_columns(board_id, |columns| {
                ops::move_task(columns, source_column_id, dest_column_id, task_id, dest_index)
            })
            .await;
        self.record("move_task", result)
    }

    /// Drop a task onto a column body: append it at the end. Dropping onto
    /// its own column does nothing.
    pub async fn drop_task_at_end(
        &self,
        board_id: &str,
        source_column_id: &str,
        dest_column_id: &str,
        task_id: &str,
    ) -> Result<(), BoardError> {
        if source_column_id == dest_column_id {
            return Ok(());
        }
        let dest_len = self.cache.read(|c| {
            c.board(board_id)
                .and_then(|b| b.column(dest_column_id))
                .map_or(0, |col| col.tasks.len())
        });
        self.move_task(board_id, source_column_id, dest_column_id, task_id, dest_len)
            .await
    }

    /// Append an empty column. Returns the new column's id.
    pub async fn add_column(&self, board_id: &str, title: Option<&str>) -> Result<String, BoardError> {
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(self.config.new_column_title.as_str());
        let column = Column::empty(self.ids.next_id(), title);
        let column_id = column.id.clone();
        let result = self
            .rewrite_columns(board_id, |columns| Ok(ops::add_column(columns, column)))
            .await
            .map(|()| column_id);
        self.record("add_column", result)
    }

    /// Remove a column and its tasks. Refused when it is the board's last
    /// column; nothing is written in that case.
    pub async fn delete_column(&self, board_id: &str, column_id: &str) -> Result<(), BoardError> {
        let result = self
            .rewrite_columns(board_id, |columns| ops::delete_column(columns, column_id))
            .await;
        self.record("delete_column", result)
    }

    /// Read the cached board, transform its columns, write them back.
    async fn rewrite_columns<F>(&self, board_id: &str, transform: F) -> Result<(), BoardError>
    where
        F: FnOnce(&[Column]) -> Result<Vec<Column>, BoardError>,
    {
        self.require_user()?;
        let board = self.cached_board(board_id)?;
        let columns = transform(&board.columns)?;
        self.update_board_inner(board_id, &BoardPatch::columns(columns))
            .await
    }
}
