use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use thiserror::Error;
use uuid::Uuid;

use crate::message::{Message, MessageContent, NewMessage};

/// How long any single store operation may run before it is abandoned. The
/// caller sees a `Timeout` instead of hanging on an unresponsive database.
const STORE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store operation timed out")]
    Timeout,
    #[error("unrecognized message kind: {0}")]
    UnknownKind(String),
}

/// Durable storage for messages. The store is the sole owner of persisted
/// state and assigns `id` and `createdAt` at save time.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn save(&self, new: NewMessage) -> Result<Message, StoreError>;
    /// All messages, oldest first.
    async fn find_all(&self) -> Result<Vec<Message>, StoreError>;
}

pub struct SqliteMessageStore {
    pool: SqlitePool,
}

impl SqliteMessageStore {
    /// Connect and create the schema. A single connection is enough: SQLite
    /// takes one writer at a time anyway. The connection is held for the
    /// pool's whole lifetime (no idle reaping, no max lifetime); recycling
    /// it would wipe a `sqlite::memory:` database along with all history.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .acquire_timeout(STORE_TIMEOUT)
            .connect_with(options)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id         TEXT PRIMARY KEY,
                kind       TEXT NOT NULL,
                body       TEXT,
                file_url   TEXT,
                file_name  TEXT,
                sender     TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl MessageStore for SqliteMessageStore {
    async fn save(&self, new: NewMessage) -> Result<Message, StoreError> {
        let message = Message {
            id: Uuid::new_v4().to_string(),
            content: new.content,
            sender: new.sender,
            created_at: Utc::now(),
        };

        let (body, file_url, file_name) = match &message.content {
            MessageContent::Text { body } => (Some(body.as_str()), None, None),
            MessageContent::File {
                file_url,
                file_name,
            } => (None, Some(file_url.as_str()), Some(file_name.as_str())),
        };

        let insert = sqlx::query(
            "INSERT INTO messages (id, kind, body, file_url, file_name, sender, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&message.id)
        .bind(message.content.kind())
        .bind(body)
        .bind(file_url)
        .bind(file_name)
        .bind(&message.sender)
        .bind(message.created_at.timestamp_millis())
        .execute(&self.pool);

        tokio::time::timeout(STORE_TIMEOUT, insert)
            .await
            .map_err(|_| StoreError::Timeout)??;

        Ok(message)
    }

    async fn find_all(&self) -> Result<Vec<Message>, StoreError> {
        // rowid breaks millisecond ties so replay order equals insertion order
        let select = sqlx::query(
            "SELECT id, kind, body, file_url, file_name, sender, created_at \
             FROM messages ORDER BY created_at ASC, rowid ASC",
        )
        .fetch_all(&self.pool);

        let rows = tokio::time::timeout(STORE_TIMEOUT, select)
            .await
            .map_err(|_| StoreError::Timeout)??;

        rows.into_iter().map(row_to_message).collect()
    }
}

fn row_to_message(row: SqliteRow) -> Result<Message, StoreError> {
    let kind: String = row.get("kind");
    let content = match kind.as_str() {
        "text" => MessageContent::Text {
            body: row.get::<Option<String>, _>("body").unwrap_or_default(),
        },
        "file" => MessageContent::File {
            file_url: row.get::<Option<String>, _>("file_url").unwrap_or_default(),
            file_name: row
                .get::<Option<String>, _>("file_name")
                .unwrap_or_default(),
        },
        other => return Err(StoreError::UnknownKind(other.to_string())),
    };

    let created_ms: i64 = row.get("created_at");
    let created_at = DateTime::<Utc>::from_timestamp_millis(created_ms).unwrap_or_else(Utc::now);

    Ok(Message {
        id: row.get("id"),
        content,
        sender: row.get("sender"),
        created_at,
    })
}
