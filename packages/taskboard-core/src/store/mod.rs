pub mod memory;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use crate::types::Timestamp;

pub type Fields = Map<String, Value>;

/// A remote document: store-assigned id plus opaque key/value fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

/// Address of a single document inside a collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocRef {
    pub collection: String,
    pub id: String,
}

impl DocRef {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

/// Optional server-side narrowing of a subscribed collection.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Equals { field: String, value: Value },
    ArrayContains { field: String, value: Value },
}

impl Filter {
    pub fn matches(&self, fields: &Fields) -> bool {
        match self {
            Filter::Equals { field, value } => fields.get(field) == Some(value),
            Filter::ArrayContains { field, value } => fields
                .get(field)
                .and_then(Value::as_array)
                .is_some_and(|items| items.contains(value)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filter: Option<Filter>,
}

impl Query {
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn matches(&self, fields: &Fields) -> bool {
        self.filter.as_ref().map_or(true, |f| f.matches(fields))
    }
}

/// One push from a subscription: every document currently matching the
/// query, or the error that broke the channel.
pub type SnapshotEvent = Result<Vec<Document>, StoreError>;

/// Receiving end of a push subscription. Dropping it unsubscribes.
pub type SnapshotReceiver = mpsc::UnboundedReceiver<SnapshotEvent>;

/// Realtime document collection the boards live in.
///
/// Writes are one-shot and whole-document; there is no compare-and-swap.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Open a push subscription. The current matching set is delivered
    /// immediately, then again after every change to a matching document.
    fn subscribe(&self, query: Query) -> Result<SnapshotReceiver, StoreError>;

    async fn create(&self, collection: &str, fields: Fields) -> Result<String, StoreError>;

    /// Merge `fields` into an existing document. Fails with `NotFound` if it
    /// no longer exists.
    async fn update(&self, doc: &DocRef, fields: Fields) -> Result<(), StoreError>;

    async fn delete(&self, doc: &DocRef) -> Result<(), StoreError>;

    /// Store clock, used for `createdAt` / `updatedAt`.
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Write rejected: {0}")]
    Rejected(String),

    #[error("Subscription error: {0}")]
    Subscription(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
