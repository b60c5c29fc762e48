/// Snapshot reconciliation.
///
/// Turns a raw push from the remote store into the canonical board list:
/// 1. Parse and validate every document, dropping malformed ones
/// 2. Keep boards visible to the signed-in user (owner or member)
/// 3. Sort newest first by `createdAt`; boards without a usable one sort last
///
/// `reconcile` is pure. `apply_snapshot` / `apply_error` publish the result
/// into a cache and re-derive the open board.
use crate::cache::BoardCache;
use crate::codec::{self, DocumentError};
use crate::selection;
use crate::store::{Document, StoreError};
use crate::types::Board;

/// Outcome of reconciling one snapshot.
#[derive(Debug)]
pub struct Reconciliation {
    pub boards: Vec<Board>,
    /// Documents that failed validation, by id.
    pub rejected: Vec<(String, DocumentError)>,
}

pub fn reconcile(user_id: &str, docs: &[Document]) -> Reconciliation {
    let mut boards = Vec::with_capacity(docs.len());
    let mut rejected = Vec::new();

    for doc in docs {
        match codec::board_from_document(doc) {
            Ok(board) if board.is_visible_to(user_id) => boards.push(board),
            Ok(_) => {}
            Err(e) => rejected.push((doc.id.clone(), e)),
        }
    }

    // Stable sort: equal keys keep snapshot order.
    boards.sort_by_key(|board| std::cmp::Reverse(codec::created_at_millis(board)));

    Reconciliation { boards, rejected }
}

/// Reconcile `docs` and publish the result into `cache`.
pub fn apply_snapshot(cache: &mut BoardCache, user_id: &str, docs: &[Document]) {
    let Reconciliation { boards, rejected } = reconcile(user_id, docs);

    for (doc_id, err) in &rejected {
        log::warn!(
            "[taskboard.reconcile] Dropping document {}: {}",
            doc_id,
            err
        );
    }
    log::debug!(
        "[taskboard.reconcile] {} documents -> {} visible boards",
        docs.len(),
        boards.len()
    );

    cache.replace_boards(boards);
    selection::refresh_selection(cache);
}

/// Record a broken subscription. The board list keeps its last good value.
pub fn apply_error(cache: &mut BoardCache, err: &StoreError) {
    log::error!("[taskboard.reconcile] Subscription failed: {}", err);
    cache.record_error(err.to_string());
    cache.loading = false;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn doc(id: &str, value: Value) -> Document {
        Document {
            id: id.to_string(),
            fields: value.as_object().cloned().unwrap(),
        }
    }

    fn board_doc(id: &str, owner: &str, members: &[&str], created: Option<i64>) -> Document {
        let mut value = json!({
            "name": format!("Board {}", id),
            "color": "#667eea",
            "description": "",
            "ownerId": owner,
            "members": members,
            "columns": [{"id": "1", "title": "To do", "tasks": []}]
        });
        if let Some(seconds) = created {
            value["createdAt"] = json!({"seconds": seconds, "nanos": 0});
        }
        doc(id, value)
    }

    fn ids(boards: &[Board]) -> Vec<&str> {
        boards.iter().map(|b| b.id.as_str()).collect()
    }

    #[test]
    fn test_hidden_from_non_member() {
        let docs = vec![board_doc("b1", "u1", &["u1"], Some(1))];
        assert!(reconcile("u2", &docs).boards.is_empty());

        let docs = vec![board_doc("b1", "u1", &["u1", "u2"], Some(1))];
        assert_eq!(ids(&reconcile("u2", &docs).boards), vec!["b1"]);
    }

    #[test]
    fn test_sorted_newest_first() {
        let docs = vec![
            board_doc("t3", "u1", &["u1"], Some(100)),
            board_doc("t1", "u1", &["u1"], Some(300)),
            board_doc("t2", "u1", &["u1"], Some(200)),
        ];
        assert_eq!(ids(&reconcile("u1", &docs).boards), vec!["t1", "t2", "t3"]);
    }

    #[test]
    fn test_missing_created_at_sorts_last() {
        let docs = vec![
            board_doc("none", "u1", &["u1"], None),
            board_doc("old", "u1", &["u1"], Some(1)),
            board_doc("new", "u1", &["u1"], Some(2)),
        ];
        assert_eq!(ids(&reconcile("u1", &docs).boards), vec!["new", "old", "none"]);
    }

    #[test]
    fn test_out_of_range_created_at_sorts_as_missing() {
        let docs = vec![
            board_doc("huge", "u1", &["u1"], Some(i64::MAX)),
            board_doc("normal", "u1", &["u1"], Some(5)),
            board_doc("none", "u1", &["u1"], None),
        ];
        assert_eq!(ids(&reconcile("u1", &docs).boards), vec!["normal", "huge", "none"]);
    }

    #[test]
    fn test_pre_epoch_created_at_sorts_before_missing() {
        let docs = vec![
            board_doc("none", "u1", &["u1"], None),
            board_doc("old", "u1", &["u1"], Some(-86_400)),
            board_doc("new", "u1", &["u1"], Some(86_400)),
        ];
        assert_eq!(ids(&reconcile("u1", &docs).boards), vec!["new", "old", "none"]);
    }

    #[test]
    fn test_equal_keys_keep_snapshot_order() {
        let docs = vec![
            board_doc("x", "u1", &["u1"], None),
            board_doc("y", "u1", &["u1"], None),
            board_doc("z", "u1", &["u1"], None),
        ];
        assert_eq!(ids(&reconcile("u1", &docs).boards), vec!["x", "y", "z"]);
    }

    #[test]
    fn test_malformed_documents_dropped() {
        let docs = vec![
            board_doc("good", "u1", &["u1"], Some(1)),
            doc("bad", json!({"name": 42})),
        ];
        let result = reconcile("u1", &docs);
        assert_eq!(ids(&result.boards), vec!["good"]);
        assert_eq!(result.rejected.len(), 1);
        assert_eq!(result.rejected[0].0, "bad");
    }

    #[test]
    fn test_apply_snapshot_replaces_and_reselects() {
        let mut cache = BoardCache {
            loading: true,
            ..BoardCache::default()
        };
        apply_snapshot(&mut cache, "u1", &[board_doc("b1", "u1", &["u1"], Some(1))]);
        assert!(!cache.is_loading());
        selection::select_board(&mut cache, Some("b1"));

        let mut renamed = board_doc("b1", "u1", &["u1"], Some(1));
        renamed.fields.insert("name".to_string(), json!("Renamed"));
        apply_snapshot(&mut cache, "u1", &[renamed]);
        assert_eq!(cache.selected_board().map(|b| b.name.as_str()), Some("Renamed"));

        apply_snapshot(&mut cache, "u1", &[]);
        assert!(cache.boards().is_empty());
        assert!(cache.selected_board().is_none());
    }

    #[test]
    fn test_apply_error_keeps_stale_boards() {
        let mut cache = BoardCache::default();
        apply_snapshot(&mut cache, "u1", &[board_doc("b1", "u1", &["u1"], Some(1))]);
        cache.loading = true;

        apply_error(&mut cache, &StoreError::Subscription("offline".to_string()));
        assert_eq!(cache.boards().len(), 1);
        assert!(!cache.is_loading());
        assert_eq!(cache.last_error(), Some("Subscription error: offline"));
    }
}
