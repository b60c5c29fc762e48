pub mod cache;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod ids;
pub mod ops;
pub mod reconcile;
pub mod selection;
pub mod session;
pub mod store;
pub mod types;

pub use cache::{BoardCache, SharedCache};
pub use config::{load_config, SyncConfig, User};
pub use engine::MutationEngine;
pub use error::BoardError;
pub use session::Session;
pub use store::memory::MemoryStore;
pub use store::{RemoteStore, StoreError};
pub use types::{Board, BoardPatch, Column, NewTask, Priority, Task, TaskPatch};
