use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

use crate::models::{Message, NewMessage, OwnerId};

use super::{Store, StoreError, role_from_db};

impl Store {
    pub async fn list_chat_messages(
        &self,
        owner: &OwnerId,
        session_id: Uuid,
    ) -> Result<Vec<Message>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, session_id, owner, role, content, sources, created_at
             FROM chat_messages
             WHERE owner = $1
               AND session_id = $2
             ORDER BY created_at ASC, id ASC",
        )
        .bind(owner.as_str())
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(message_from_row).collect()
    }

    pub async fn insert_chat_message(&self, message: &NewMessage) -> Result<Message, StoreError> {
        // chat_messages.session_id is a foreign key, so a dangling session fails here.
        let row = sqlx::query(
            "INSERT INTO chat_messages (id, session_id, owner, role, content, sources, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING id, session_id, owner, role, content, sources, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(message.session_id)
        .bind(message.owner.as_str())
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(message.sources.as_deref())
        .bind(message.created_at)
        .fetch_one(&self.pool)
        .await?;

        message_from_row(&row)
    }

    pub async fn delete_chat_messages(&self, session_id: Uuid) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "DELETE FROM chat_messages
             WHERE session_id = $1",
        )
        .bind(session_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

fn message_from_row(row: &PgRow) -> Result<Message, StoreError> {
    let owner: String = row.try_get("owner")?;
    let role_raw: String = row.try_get("role")?;

    Ok(Message {
        id: row.try_get("id")?,
        session_id: row.try_get("session_id")?,
        owner: OwnerId::new(owner),
        role: role_from_db(&role_raw)?,
        content: row.try_get("content")?,
        sources: row.try_get::<Option<Vec<String>>, _>("sources")?,
        created_at: row.try_get("created_at")?,
    })
}
