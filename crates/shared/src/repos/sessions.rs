use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

use crate::models::{OwnerId, Session};

use super::{Store, StoreError};

impl Store {
    pub async fn list_chat_sessions(&self, owner: &OwnerId) -> Result<Vec<Session>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, owner, title, created_at
             FROM chat_sessions
             WHERE owner = $1
             ORDER BY created_at DESC, id DESC",
        )
        .bind(owner.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(session_from_row).collect()
    }

    pub async fn get_chat_session(
        &self,
        owner: &OwnerId,
        session_id: Uuid,
    ) -> Result<Option<Session>, StoreError> {
        let row = sqlx::query(
            "SELECT id, owner, title, created_at
             FROM chat_sessions
             WHERE owner = $1
               AND id = $2",
        )
        .bind(owner.as_str())
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(session_from_row).transpose()
    }

    pub async fn insert_chat_session(
        &self,
        owner: &OwnerId,
        title: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Session, StoreError> {
        let row = sqlx::query(
            "INSERT INTO chat_sessions (id, owner, title, created_at)
             VALUES ($1, $2, $3, $4)
             RETURNING id, owner, title, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(owner.as_str())
        .bind(title)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await?;

        session_from_row(&row)
    }

    pub async fn delete_chat_session(
        &self,
        owner: &OwnerId,
        session_id: Uuid,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "DELETE FROM chat_sessions
             WHERE owner = $1
               AND id = $2",
        )
        .bind(owner.as_str())
        .bind(session_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn session_from_row(row: &PgRow) -> Result<Session, StoreError> {
    let owner: String = row.try_get("owner")?;
    Ok(Session {
        id: row.try_get("id")?,
        owner: OwnerId::new(owner),
        title: row.try_get("title")?,
        created_at: row.try_get("created_at")?,
    })
}
