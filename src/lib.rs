//! Patter chat backend.
//!
//! A WebSocket relay persists incoming text messages and fans them out to
//! every connected client; an HTTP service replays the history and accepts
//! file uploads that flow through the same fan-out.

use std::sync::Arc;

pub mod config;
pub mod error;
pub mod files;
pub mod http;
pub mod message;
pub mod registry;
pub mod relay;
pub mod store;

pub use config::{Config, ConfigError};
pub use files::{DiskFileStore, FileStore, FileStoreError};
pub use message::{Message, MessageContent, NewMessage};
pub use registry::{ConnectionId, ConnectionRegistry};
pub use store::{MessageStore, SqliteMessageStore, StoreError};

/// Shared state, constructed once in `main` and handed to the relay and
/// every HTTP handler.
pub struct AppState {
    pub config: Config,
    pub registry: ConnectionRegistry,
    pub store: Arc<dyn MessageStore>,
    pub files: Arc<dyn FileStore>,
}
