/// Conversion between remote documents and board entities.
///
/// Incoming documents are validated against the Board/Column/Task shapes
/// before they may enter the cache. Timestamps are read leniently: a value
/// that cannot be understood becomes `None` rather than rejecting the board.
use std::collections::HashSet;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::store::{Document, Fields, StoreError};
use crate::types::{Board, BoardPatch, Timestamp};

/// Why a snapshot document was not accepted as a board.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("Malformed board document: {0}")]
    Shape(#[from] serde_json::Error),

    #[error("Board has no columns")]
    NoColumns,

    #[error("Board has no owner")]
    NoOwner,

    #[error("Duplicate column id: {0}")]
    DuplicateColumn(String),
}

/// Read a timestamp in any of the forms the store may produce:
/// `{ seconds, nanos }`, integer milliseconds, or an RFC 3339 string.
pub fn parse_timestamp(value: &Value) -> Option<Timestamp> {
    match value {
        Value::Object(map) => {
            let seconds = map.get("seconds").and_then(Value::as_i64)?;
            let nanos = map
                .get("nanos")
                .or_else(|| map.get("nanoseconds"))
                .and_then(Value::as_u64)
                .unwrap_or(0);
            Some(Timestamp {
                seconds,
                nanos: u32::try_from(nanos).ok().filter(|n| *n < 1_000_000_000)?,
            })
        }
        Value::Number(n) => n.as_i64().map(Timestamp::from_millis),
        Value::String(s) => chrono::DateTime::parse_from_rfc3339(s).ok().map(|dt| Timestamp {
            seconds: dt.timestamp(),
            nanos: dt.timestamp_subsec_nanos(),
        }),
        _ => None,
    }
}

/// Serde adapter for optional timestamp fields.
pub fn lenient_timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Timestamp>, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(parse_timestamp(&value))
}

/// Sort key used by reconciliation: milliseconds since the epoch, `None`
/// when the document carries no usable `createdAt`. `None` orders below
/// every timestamp, including ones before 1970.
pub fn created_at_millis(board: &Board) -> Option<i64> {
    board.created_at.and_then(|ts| ts.to_millis())
}

/// Parse and validate a board document.
///
/// An owner missing from `members` is added back rather than rejected.
pub fn board_from_document(doc: &Document) -> Result<Board, DocumentError> {
    let mut board: Board = serde_json::from_value(Value::Object(doc.fields.clone()))?;
    board.id = doc.id.clone();

    if board.owner_id.trim().is_empty() {
        return Err(DocumentError::NoOwner);
    }
    if board.columns.is_empty() {
        return Err(DocumentError::NoColumns);
    }
    let mut seen = HashSet::new();
    for column in &board.columns {
        if !seen.insert(column.id.as_str()) {
            return Err(DocumentError::DuplicateColumn(column.id.clone()));
        }
    }
    if !board.members.contains(&board.owner_id) {
        log::debug!(
            "[taskboard.codec] Board {} lists no owner membership, restoring it",
            doc.id
        );
        board.members.insert(0, board.owner_id.clone());
    }
    Ok(board)
}

fn into_fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        _ => Fields::new(),
    }
}

/// Encode a full board for document creation. The id is not stored.
pub fn board_to_fields(board: &Board) -> Result<Fields, StoreError> {
    Ok(into_fields(serde_json::to_value(board)?))
}

/// Encode only the fields a patch sets.
pub fn patch_to_fields(patch: &BoardPatch) -> Result<Fields, StoreError> {
    Ok(into_fields(serde_json::to_value(patch)?))
}

pub fn timestamp_to_value(ts: Timestamp) -> Result<Value, StoreError> {
    Ok(serde_json::to_value(ts)?)
}
