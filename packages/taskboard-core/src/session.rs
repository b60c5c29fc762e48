/// Per-session context: owns the cache, the push subscription, and the
/// signed-in identity, and hands out mutation engines bound to them.
///
/// One `Session` exists per signed-in user; tests create as many as they
/// like. Subscription lifecycle:
///   sign_in  -> subscribe to the board collection, spawn the reconcile loop
///   snapshot -> reconcile into the cache, re-derive the open board
///   error    -> record `last_error`, keep the stale list
///   sign_out -> signal the loop to stop, clear the cache
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::cache::{BoardCache, SharedCache};
use crate::config::{SyncConfig, User};
use crate::engine::MutationEngine;
use crate::error::BoardError;
use crate::ids::{IdGenerator, TimeIds};
use crate::reconcile;
use crate::selection;
use crate::store::{Query, RemoteStore, SnapshotReceiver};
use crate::types::Board;

/// Handle to a running reconcile loop. Dropping it does not stop the loop;
/// call `unsubscribe`.
struct Subscription {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Subscription {
    /// Stop the loop. Snapshots still queued are discarded along with the
    /// receiver, which releases the store-side subscription.
    fn unsubscribe(self) {
        let _ = self.shutdown_tx.send(true);
        self.task.abort();
    }
}

pub struct Session {
    store: Arc<dyn RemoteStore>,
    config: Arc<SyncConfig>,
    ids: Arc<dyn IdGenerator>,
    cache: SharedCache,
    subscription: Option<Subscription>,
}

impl Session {
    pub fn new(store: Arc<dyn RemoteStore>, config: SyncConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
            ids: Arc::new(TimeIds),
            cache: SharedCache::new(),
            subscription: None,
        }
    }

    /// Replace the id generator used for new tasks and columns.
    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn user(&self) -> Option<User> {
        self.cache.read(|c| c.user().cloned())
    }

    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }

    /// Mutation engine sharing this session's cache. It acts as whoever is
    /// signed in when each call is made, and fails with `NotAuthenticated`
    /// after a sign-out.
    pub fn engine(&self) -> MutationEngine {
        MutationEngine::new(
            self.store.clone(),
            self.cache.clone(),
            self.ids.clone(),
            self.config.clone(),
        )
    }

    /// Auth session-changed event: `Some` signs in (replacing any previous
    /// user), `None` signs out.
    pub fn on_auth_changed(&mut self, user: Option<User>) -> Result<(), BoardError> {
        match user {
            Some(user) => self.sign_in(user),
            None => {
                self.sign_out();
                Ok(())
            }
        }
    }

    /// Start the board subscription for `user`. Must run inside a Tokio
    /// runtime.
    pub fn sign_in(&mut self, user: User) -> Result<(), BoardError> {
        if self.subscription.is_some() || self.user().is_some() {
            self.sign_out();
        }
        log::info!("[taskboard.session] Signing in {}", user.id);

        let user_id = user.id.clone();
        let epoch = self.cache.update(|c| {
            c.user = Some(user);
            c.loading = true;
            c.epoch
        });

        let rx = match self
            .store
            .subscribe(Query::collection(self.config.collection.as_str()))
        {
            Ok(rx) => rx,
            Err(e) => {
                self.cache.update(|c| reconcile::apply_error(c, &e));
                return Err(BoardError::Subscription(e.to_string()));
            }
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_subscription(
            rx,
            shutdown_rx,
            self.cache.clone(),
            user_id,
            epoch,
        ));
        self.subscription = Some(Subscription { shutdown_tx, task });
        Ok(())
    }

    /// Release the subscription and drop all cached state. Writes already in
    /// flight are not cancelled; their snapshots are ignored.
    pub fn sign_out(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
            log::info!("[taskboard.session] Subscription released");
        }
        self.cache.update(BoardCache::clear);
    }

    pub fn boards(&self) -> Vec<Board> {
        self.cache.read(|c| c.boards().to_vec())
    }

    pub fn select_board(&self, board_id: Option<&str>) {
        self.cache
            .update(|c| selection::select_board(c, board_id));
    }

    pub fn selected_board(&self) -> Option<Board> {
        self.cache.read(|c| c.selected_board().cloned())
    }

    pub fn is_loading(&self) -> bool {
        self.cache.read(BoardCache::is_loading)
    }

    pub fn last_error(&self) -> Option<String> {
        self.cache.read(|c| c.last_error().map(str::to_owned))
    }

    /// Notified after every cache change.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.cache.changes()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }
}

/// Reconcile loop: applies pushes in arrival order until shut down or the
/// store closes the channel. Snapshots that arrive after the cache was
/// cleared for a later session are discarded.
async fn run_subscription(
    mut rx: SnapshotReceiver,
    mut shutdown_rx: watch::Receiver<bool>,
    cache: SharedCache,
    user_id: String,
    epoch: u64,
) {
    loop {
        tokio::select! {
            biased;
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
            event = rx.recv() => {
                let Some(event) = event else {
                    log::warn!("[taskboard.session] Store closed the subscription");
                    break;
                };
                if *shutdown_rx.borrow() {
                    break;
                }
                let applied = cache.update(|c| {
                    if c.epoch != epoch {
                        return false;
                    }
                    match &event {
                        Ok(docs) => reconcile::apply_snapshot(c, &user_id, docs),
                        Err(e) => reconcile::apply_error(c, e),
                    }
                    true
                });
                if !applied {
                    break;
                }
            }
        }
    }
    log::debug!("[taskboard.session] Reconcile loop for {} stopped", user_id);
}
