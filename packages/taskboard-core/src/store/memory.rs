/// In-process realtime document store.
///
/// Holds documents per collection and pushes the full matching set to every
/// subscriber after each change, mirroring a hosted realtime store:
/// - Store-assigned document ids from a monotonic counter
/// - Merge semantics for updates, `NotFound` when the target is gone
/// - Closed subscribers are pruned on the next push
/// - Fault injection for writes and subscriptions
/// - A pause gate that holds writes in flight until released
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use super::{DocRef, Document, Fields, Query, RemoteStore, SnapshotEvent, SnapshotReceiver, StoreError};

struct Subscriber {
    query: Query,
    tx: mpsc::UnboundedSender<SnapshotEvent>,
}

/// In-memory `RemoteStore`.
pub struct MemoryStore {
    /// collection -> doc_id -> fields
    collections: RwLock<HashMap<String, BTreeMap<String, Fields>>>,
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
    /// Message for the next write to fail with, if armed.
    fail_next_write: Mutex<Option<String>>,
    /// `true` while writes are held.
    paused: watch::Sender<bool>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            fail_next_write: Mutex::new(None),
            paused: watch::channel(false).0,
        }
    }

    /// Insert or replace a document directly, bypassing the write path.
    /// Subscribers are notified.
    pub fn put(&self, collection: &str, id: &str, fields: Fields) {
        self.collections_mut()
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), fields);
        self.publish(collection);
    }

    /// Read a single document.
    pub fn get(&self, doc: &DocRef) -> Option<Fields> {
        self.collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&doc.collection)
            .and_then(|docs| docs.get(&doc.id))
            .cloned()
    }

    /// Number of documents in a collection.
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    /// Make the next create/update/delete fail with `Rejected(message)`.
    pub fn fail_next_write(&self, message: impl Into<String>) {
        *self
            .fail_next_write
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(message.into());
    }

    /// Push a subscription error to every open subscriber.
    pub fn break_subscriptions(&self, message: &str) {
        let mut subs = self.subscribers();
        subs.retain(|s| {
            s.tx
                .send(Err(StoreError::Subscription(message.to_string())))
                .is_ok()
        });
    }

    /// Hold every write until `resume_writes` is called.
    pub fn pause_writes(&self) {
        self.paused.send_replace(true);
    }

    pub fn resume_writes(&self) {
        self.paused.send_replace(false);
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        let mut subs = self.subscribers();
        subs.retain(|s| !s.tx.is_closed());
        subs.len()
    }

    fn collections_mut(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<String, BTreeMap<String, Fields>>> {
        self.collections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn subscribers(&self) -> MutexGuard<'_, Vec<Subscriber>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self, query: &Query) -> Vec<Document> {
        self.collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&query.collection)
            .map(|docs| {
                docs.iter()
                    .filter(|(_, fields)| query.matches(fields))
                    .map(|(id, fields)| Document {
                        id: id.clone(),
                        fields: fields.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Push the current matching set to every subscriber of `collection`.
    fn publish(&self, collection: &str) {
        let mut subs = self.subscribers();
        subs.retain(|s| {
            if s.query.collection != collection {
                return !s.tx.is_closed();
            }
            s.tx.send(Ok(self.snapshot(&s.query))).is_ok()
        });
    }

    /// Wait for the pause gate, then consume an armed failure.
    async fn begin_write(&self) -> Result<(), StoreError> {
        let mut gate = self.paused.subscribe();
        // The sender lives as long as `self`, so this cannot observe a close.
        let _ = gate.wait_for(|paused| !*paused).await;

        if let Some(message) = self
            .fail_next_write
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            log::warn!("[taskboard.store.memory] Injected write failure: {}", message);
            return Err(StoreError::Rejected(message));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    fn subscribe(&self, query: Query) -> Result<SnapshotReceiver, StoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(Ok(self.snapshot(&query)))
            .map_err(|e| StoreError::Subscription(e.to_string()))?;
        log::debug!(
            "[taskboard.store.memory] New subscription on {}",
            query.collection
        );
        self.subscribers().push(Subscriber { query, tx });
        Ok(rx)
    }

    async fn create(&self, collection: &str, fields: Fields) -> Result<String, StoreError> {
        self.begin_write().await?;
        let id = format!("doc-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        self.collections_mut()
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), fields);
        self.publish(collection);
        Ok(id)
    }

    async fn update(&self, doc: &DocRef, fields: Fields) -> Result<(), StoreError> {
        self.begin_write().await?;
        {
            let mut collections = self.collections_mut();
            let existing = collections
                .get_mut(&doc.collection)
                .and_then(|docs| docs.get_mut(&doc.id))
                .ok_or_else(|| StoreError::NotFound(doc.id.clone()))?;
            for (key, value) in fields {
                existing.insert(key, value);
            }
        }
        self.publish(&doc.collection);
        Ok(())
    }

    async fn delete(&self, doc: &DocRef) -> Result<(), StoreError> {
        self.begin_write().await?;
        let removed = self
            .collections_mut()
            .get_mut(&doc.collection)
            .and_then(|docs| docs.remove(&doc.id))
            .is_some();
        if removed {
            self.publish(&doc.collection);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_subscribe_delivers_initial_snapshot() {
        let store = MemoryStore::new();
        store.put("boards", "b1", fields(json!({"name": "Sprint"})));

        let mut rx = store.subscribe(Query::collection("boards")).unwrap();
        let docs = rx.recv().await.unwrap().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "b1");
    }

    #[tokio::test]
    async fn test_create_pushes_full_snapshot() {
        let store = MemoryStore::new();
        store.put("boards", "b1", fields(json!({"name": "Old"})));
        let mut rx = store.subscribe(Query::collection("boards")).unwrap();
        rx.recv().await.unwrap().unwrap();

        let id = store
            .create("boards", fields(json!({"name": "New"})))
            .await
            .unwrap();

        let docs = rx.recv().await.unwrap().unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs.iter().any(|d| d.id == id));
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let store = MemoryStore::new();
        store.put("boards", "b1", fields(json!({"name": "Sprint", "color": "#fff"})));

        store
            .update(&DocRef::new("boards", "b1"), fields(json!({"name": "Renamed"})))
            .await
            .unwrap();

        let doc = store.get(&DocRef::new("boards", "b1")).unwrap();
        assert_eq!(doc["name"], "Renamed");
        assert_eq!(doc["color"], "#fff");
    }

    #[tokio::test]
    async fn test_update_missing_document() {
        let store = MemoryStore::new();
        let result = store
            .update(&DocRef::new("boards", "gone"), fields(json!({"name": "x"})))
            .await;
        assert!(matches!(result, Err(StoreError::NotFound(id)) if id == "gone"));
    }

    #[tokio::test]
    async fn test_delete_is_quiet_when_absent() {
        let store = MemoryStore::new();
        store.delete(&DocRef::new("boards", "gone")).await.unwrap();
        assert!(store.is_empty("boards"));
    }

    #[tokio::test]
    async fn test_injected_write_failure_is_one_shot() {
        let store = MemoryStore::new();
        store.fail_next_write("quota exceeded");

        let first = store.create("boards", Fields::new()).await;
        assert!(matches!(first, Err(StoreError::Rejected(ref m)) if m == "quota exceeded"));
        assert!(store.create("boards", Fields::new()).await.is_ok());
        assert_eq!(store.len("boards"), 1);
    }

    #[tokio::test]
    async fn test_filtered_subscription() {
        let store = MemoryStore::new();
        store.put("boards", "b1", fields(json!({"members": ["u1"]})));
        store.put("boards", "b2", fields(json!({"members": ["u2"]})));

        let query = Query::collection("boards").with_filter(crate::store::Filter::ArrayContains {
            field: "members".to_string(),
            value: json!("u2"),
        });
        let mut rx = store.subscribe(query).unwrap();
        let docs = rx.recv().await.unwrap().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "b2");
    }

    #[tokio::test]
    async fn test_dropped_receiver_is_pruned() {
        let store = MemoryStore::new();
        let rx = store.subscribe(Query::collection("boards")).unwrap();
        assert_eq!(store.subscriber_count(), 1);
        drop(rx);
        assert_eq!(store.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_break_subscriptions_sends_error() {
        let store = MemoryStore::new();
        let mut rx = store.subscribe(Query::collection("boards")).unwrap();
        rx.recv().await.unwrap().unwrap();

        store.break_subscriptions("permission revoked");
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, Err(StoreError::Subscription(_))));
    }

    #[tokio::test]
    async fn test_paused_write_waits_for_resume() {
        let store = MemoryStore::new();
        store.pause_writes();

        let write = store.create("boards", Fields::new());
        let release = async {
            tokio::task::yield_now().await;
            assert!(store.is_empty("boards"));
            store.resume_writes();
        };
        let (created, _) = tokio::join!(write, release);
        assert!(created.is_ok());
        assert_eq!(store.len("boards"), 1);
    }
}
