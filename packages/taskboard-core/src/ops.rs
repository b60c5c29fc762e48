/// Pure transforms over a board's column list.
///
/// Each function takes the current columns and returns the complete new
/// list to be written back. Inputs are never modified.
use crate::error::BoardError;
use crate::types::{Column, Task, TaskPatch};

fn column_index(columns: &[Column], column_id: &str) -> Result<usize, BoardError> {
    columns
        .iter()
        .position(|c| c.id == column_id)
        .ok_or_else(|| BoardError::column_not_found(column_id))
}

/// Append `task` to the end of a column.
pub fn add_task(columns: &[Column], column_id: &str, task: Task) -> Result<Vec<Column>, BoardError> {
    let idx = column_index(columns, column_id)?;
    let mut next = columns.to_vec();
    next[idx].tasks.push(task);
    Ok(next)
}

/// Merge `patch` into the matching task. A missing task leaves the column
/// unchanged; a missing column is an error.
pub fn update_task(
    columns: &[Column],
    column_id: &str,
    task_id: &str,
    patch: &TaskPatch,
) -> Result<Vec<Column>, BoardError> {
    let idx = column_index(columns, column_id)?;
    let mut next = columns.to_vec();
    if let Some(task) = next[idx].tasks.iter_mut().find(|t| t.id == task_id) {
        patch.apply(task);
    }
    Ok(next)
}

/// Remove a task by id. Removing an absent task is not an error.
pub fn delete_task(columns: &[Column], column_id: &str, task_id: &str) -> Result<Vec<Column>, BoardError> {
    let idx = column_index(columns, column_id)?;
    let mut next = columns.to_vec();
    next[idx].tasks.retain(|t| t.id != task_id);
    Ok(next)
}

/// Move a task from one column to a position in another (or the same) column.
///
/// The remaining tasks keep their order. `dest_index` past the end appends.
pub fn move_task(
    columns: &[Column],
    source_column_id: &str,
    dest_column_id: &str,
    task_id: &str,
    dest_index: usize,
) -> Result<Vec<Column>, BoardError> {
    let src = column_index(columns, source_column_id)?;
    let dest = column_index(columns, dest_column_id)?;
    let pos = columns[src]
        .tasks
        .iter()
        .position(|t| t.id == task_id)
        .ok_or_else(|| BoardError::task_not_found(task_id))?;

    let mut next = columns.to_vec();
    let task = next[src].tasks.remove(pos);
    let dest_tasks = &mut next[dest].tasks;
    let at = dest_index.min(dest_tasks.len());
    dest_tasks.insert(at, task);
    Ok(next)
}

pub fn add_column(columns: &[Column], column: Column) -> Vec<Column> {
    let mut next = columns.to_vec();
    next.push(column);
    next
}

/// Remove a column together with its tasks. The last column cannot go.
pub fn delete_column(columns: &[Column], column_id: &str) -> Result<Vec<Column>, BoardError> {
    if columns.len() <= 1 {
        return Err(BoardError::LastColumn);
    }
    let idx = column_index(columns, column_id)?;
    let mut next = columns.to_vec();
    next.remove(idx);
    Ok(next)
}
