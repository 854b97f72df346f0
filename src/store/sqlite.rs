use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{ConversationRecord, DocStatus, DocumentRecord, MessageRecord, StoreError};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS conversations (
    conversation_id TEXT PRIMARY KEY,
    title           TEXT NOT NULL DEFAULT '',
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS messages (
    message_id      TEXT PRIMARY KEY,
    conversation_id TEXT NOT NULL REFERENCES conversations(conversation_id),
    role            TEXT NOT NULL,
    content         TEXT NOT NULL,
    metadata        TEXT NOT NULL DEFAULT '{}',
    created_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_conversation
    ON messages(conversation_id, created_at);

CREATE TABLE IF NOT EXISTS documents (
    doc_id     TEXT PRIMARY KEY,
    url        TEXT NOT NULL,
    source     TEXT NOT NULL,
    status     TEXT NOT NULL,
    file_name  TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_url ON documents(url);
"#;

/// SQLite-backed relational store.
///
/// The pool is shared by the HTTP handlers, the orchestrator, and the
/// ingestion workers; every operation is a single atomic statement.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `url` and apply the schema.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// In-memory store for tests; one connection so all statements share it.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    /// Create a conversation with the given (possibly empty) title.
    pub async fn create_conversation(
        &self,
        title: &str,
    ) -> Result<ConversationRecord, StoreError> {
        let record = ConversationRecord {
            conversation_id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            created_at: Utc::now(),
        };
        sqlx::query(
            "INSERT INTO conversations (conversation_id, title, created_at) VALUES (?, ?, ?)",
        )
        .bind(&record.conversation_id)
        .bind(&record.title)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;
        Ok(record)
    }

    /// Set a conversation's title, but only if it is still empty.
    ///
    /// The title is mutable exactly once; later calls are no-ops.
    pub async fn set_title_if_empty(
        &self,
        conversation_id: &str,
        title: &str,
    ) -> Result<bool, StoreError> {
        let result =
            sqlx::query("UPDATE conversations SET title = ? WHERE conversation_id = ? AND title = ''")
                .bind(title)
                .bind(conversation_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_conversations(&self) -> Result<Vec<ConversationRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT conversation_id, title, created_at FROM conversations",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(ConversationRecord {
                    conversation_id: row.try_get("conversation_id")?,
                    title: row.try_get("title")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }

    /// Append a message; conversation history is ordered by creation time.
    pub async fn append_message(
        &self,
        conversation_id: &str,
        role: &str,
        content: &str,
        metadata: serde_json::Value,
    ) -> Result<MessageRecord, StoreError> {
        let record = MessageRecord {
            message_id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            role: role.to_string(),
            content: content.to_string(),
            metadata,
            created_at: Utc::now(),
        };
        sqlx::query(
            "INSERT INTO messages (message_id, conversation_id, role, content, metadata, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.message_id)
        .bind(&record.conversation_id)
        .bind(&record.role)
        .bind(&record.content)
        .bind(serde_json::to_string(&record.metadata)?)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;
        Ok(record)
    }

    /// Fetch a conversation's messages, oldest first.
    pub async fn history(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<MessageRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT message_id, conversation_id, role, content, metadata, created_at
             FROM messages WHERE conversation_id = ?
             ORDER BY created_at ASC, rowid ASC",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let metadata: String = row.try_get("metadata")?;
                Ok(MessageRecord {
                    message_id: row.try_get("message_id")?,
                    conversation_id: row.try_get("conversation_id")?,
                    role: row.try_get("role")?,
                    content: row.try_get("content")?,
                    metadata: serde_json::from_str(&metadata)?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }

    pub async fn conversation_exists(&self, conversation_id: &str) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 FROM conversations WHERE conversation_id = ?")
            .bind(conversation_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Insert a document record under a caller-chosen id.
    ///
    /// The id is supplied rather than generated because upload locators embed
    /// it (the stored file is named after the document).
    pub async fn insert_document(
        &self,
        doc_id: &str,
        url: &str,
        source: &str,
        status: DocStatus,
        file_name: Option<&str>,
    ) -> Result<DocumentRecord, StoreError> {
        let record = DocumentRecord {
            doc_id: doc_id.to_string(),
            url: url.to_string(),
            source: source.to_string(),
            status,
            file_name: file_name.map(str::to_string),
            created_at: Utc::now(),
        };
        sqlx::query(
            "INSERT INTO documents (doc_id, url, source, status, file_name, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.doc_id)
        .bind(&record.url)
        .bind(&record.source)
        .bind(record.status.as_str())
        .bind(&record.file_name)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;
        Ok(record)
    }

    /// Look up a document by its source locator (idempotent-submission check).
    pub async fn find_document_by_locator(
        &self,
        url: &str,
    ) -> Result<Option<DocumentRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT doc_id, url, source, status, file_name, created_at
             FROM documents WHERE url = ? LIMIT 1",
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::document_from_row).transpose()
    }

    pub async fn get_document(&self, doc_id: &str) -> Result<Option<DocumentRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT doc_id, url, source, status, file_name, created_at
             FROM documents WHERE doc_id = ?",
        )
        .bind(doc_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::document_from_row).transpose()
    }

    pub async fn set_document_status(
        &self,
        doc_id: &str,
        status: DocStatus,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE documents SET status = ? WHERE doc_id = ?")
            .bind(status.as_str())
            .bind(doc_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    fn document_from_row(row: sqlx::sqlite::SqliteRow) -> Result<DocumentRecord, StoreError> {
        let status: String = row.try_get("status")?;
        Ok(DocumentRecord {
            doc_id: row.try_get("doc_id")?,
            url: row.try_get("url")?,
            source: row.try_get("source")?,
            status: DocStatus::parse(&status)?,
            file_name: row.try_get("file_name")?,
            created_at: row.try_get("created_at")?,
        })
    }
}
