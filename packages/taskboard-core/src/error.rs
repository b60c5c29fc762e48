use crate::store::StoreError;

/// Errors surfaced by mutations and by the session's subscription.
#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Remote write failed: {0}")]
    RemoteWrite(StoreError),

    #[error("Subscription failed: {0}")]
    Subscription(String),

    #[error("A board must have at least one column")]
    LastColumn,

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<StoreError> for BoardError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(doc_id) => BoardError::NotFound(format!("board {}", doc_id)),
            other => BoardError::RemoteWrite(other),
        }
    }
}

impl BoardError {
    pub(crate) fn board_not_found(board_id: &str) -> Self {
        BoardError::NotFound(format!("board {}", board_id))
    }

    pub(crate) fn column_not_found(column_id: &str) -> Self {
        BoardError::NotFound(format!("column {}", column_id))
    }

    pub(crate) fn task_not_found(task_id: &str) -> Self {
        BoardError::NotFound(format!("task {}", task_id))
    }
}
