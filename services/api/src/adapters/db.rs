//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `ChatStore` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use admissions_chat_core::domain::{
    AuditEntry, Chat, ChatPatch, ChatStatus, ConversationTurn, TurnMeta, TurnRole,
};
use admissions_chat_core::ports::{ChatStore, PortError, PortResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `ChatStore` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ChatRecord {
    id: Uuid,
    user_id: Uuid,
    title: String,
    status: String,
    admin_taken_over: bool,
    created_at: DateTime<Utc>,
    last_message_at: DateTime<Utc>,
}

impl ChatRecord {
    fn to_domain(self) -> PortResult<Chat> {
        let status = ChatStatus::parse(&self.status).ok_or_else(|| {
            PortError::Unexpected(format!("Unknown chat status '{}' in database", self.status))
        })?;
        Ok(Chat {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            status,
            admin_taken_over: self.admin_taken_over,
            created_at: self.created_at,
            last_message_at: self.last_message_at,
        })
    }
}

#[derive(FromRow)]
struct MessageRecord {
    id: Uuid,
    chat_id: Uuid,
    role: String,
    content: String,
    meta: Option<String>,
    created_at: DateTime<Utc>,
}

impl MessageRecord {
    fn to_domain(self) -> PortResult<ConversationTurn> {
        let role = TurnRole::parse(&self.role).ok_or_else(|| {
            PortError::Unexpected(format!("Unknown message role '{}' in database", self.role))
        })?;
        let meta = match self.meta {
            Some(raw) => Some(
                serde_json::from_str::<TurnMeta>(&raw)
                    .map_err(|e| PortError::Unexpected(format!("Malformed message meta: {e}")))?,
            ),
            None => None,
        };
        Ok(ConversationTurn {
            id: self.id,
            chat_id: self.chat_id,
            role,
            content: self.content,
            meta,
            created_at: self.created_at,
        })
    }
}

//=========================================================================================
// `ChatStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ChatStore for DbAdapter {
    async fn create_chat(&self, user_id: Uuid, title: &str) -> PortResult<Chat> {
        let record = sqlx::query_as::<_, ChatRecord>(
            "INSERT INTO chats (id, user_id, title) VALUES ($1, $2, $3) \
             RETURNING id, user_id, title, status, admin_taken_over, created_at, last_message_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(title)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        record.to_domain()
    }

    async fn get_chat(&self, chat_id: Uuid) -> PortResult<Chat> {
        let record = sqlx::query_as::<_, ChatRecord>(
            "SELECT id, user_id, title, status, admin_taken_over, created_at, last_message_at \
             FROM chats WHERE id = $1",
        )
        .bind(chat_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Chat {} not found", chat_id)),
            _ => PortError::Unexpected(e.to_string()),
        })?;
        record.to_domain()
    }

    async fn list_chats(&self) -> PortResult<Vec<Chat>> {
        let records = sqlx::query_as::<_, ChatRecord>(
            "SELECT id, user_id, title, status, admin_taken_over, created_at, last_message_at \
             FROM chats ORDER BY last_message_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn update_chat(&self, chat_id: Uuid, patch: ChatPatch) -> PortResult<Chat> {
        // Single field-level update; unset patch fields keep their value.
        let record = sqlx::query_as::<_, ChatRecord>(
            "UPDATE chats SET \
                 title = COALESCE($2, title), \
                 status = COALESCE($3, status), \
                 admin_taken_over = COALESCE($4, admin_taken_over), \
                 last_message_at = COALESCE($5, last_message_at) \
             WHERE id = $1 \
             RETURNING id, user_id, title, status, admin_taken_over, created_at, last_message_at",
        )
        .bind(chat_id)
        .bind(patch.title)
        .bind(patch.status.map(|s| s.as_str().to_string()))
        .bind(patch.admin_taken_over)
        .bind(patch.last_message_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Chat {} not found", chat_id)),
            _ => PortError::Unexpected(e.to_string()),
        })?;
        record.to_domain()
    }

    async fn append_turn(
        &self,
        chat_id: Uuid,
        role: TurnRole,
        content: &str,
        meta: Option<TurnMeta>,
    ) -> PortResult<ConversationTurn> {
        let meta_json = match &meta {
            Some(meta) => Some(
                serde_json::to_string(meta)
                    .map_err(|e| PortError::Unexpected(format!("Failed to encode meta: {e}")))?,
            ),
            None => None,
        };

        let record = sqlx::query_as::<_, MessageRecord>(
            "INSERT INTO messages (id, chat_id, role, content, meta) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, chat_id, role, content, meta, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(chat_id)
        .bind(role.as_str())
        .bind(content)
        .bind(meta_json)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        record.to_domain()
    }

    async fn turns_for_chat(&self, chat_id: Uuid, count: i64) -> PortResult<Vec<ConversationTurn>> {
        let records = sqlx::query_as::<_, MessageRecord>(
            "SELECT id, chat_id, role, content, meta, created_at FROM ( \
                 SELECT id, chat_id, role, content, meta, created_at \
                 FROM messages WHERE chat_id = $1 \
                 ORDER BY created_at DESC LIMIT $2 \
             ) AS recent ORDER BY created_at ASC",
        )
        .bind(chat_id)
        .bind(count)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn record_audit(&self, entry: AuditEntry) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO audit_logs (id, chat_id, message_id, model, prompt, context, response, usage) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(Uuid::new_v4())
        .bind(entry.chat_id)
        .bind(entry.message_id)
        .bind(entry.model)
        .bind(entry.prompt)
        .bind(entry.context)
        .bind(entry.response)
        .bind(entry.usage)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }
}
