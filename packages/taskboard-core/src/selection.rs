/// Tracks which board is open. Selection always holds a copy taken from the
/// current board list, never a board the list does not contain.
use crate::cache::BoardCache;

/// Select by id, or deselect with `None`. An unknown id deselects.
pub fn select_board(cache: &mut BoardCache, board_id: Option<&str>) {
    cache.selected = board_id.and_then(|id| cache.board(id).cloned());
}

/// Re-resolve the open board against a freshly reconciled list.
pub fn refresh_selection(cache: &mut BoardCache) {
    if let Some(id) = cache.selected_board_id().map(str::to_owned) {
        let fresh = cache.board(&id).cloned();
        if fresh.is_none() {
            log::info!(
                "[taskboard.selection] Open board {} is gone, returning to list",
                id
            );
        }
        cache.selected = fresh;
    }
}

/// Deselect `board_id` if it is the open board.
pub fn deselect_if_open(cache: &mut BoardCache, board_id: &str) {
    if cache.selected_board_id() == Some(board_id) {
        cache.selected = None;
    }
}
