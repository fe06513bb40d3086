use sqlx::Row;
use uuid::Uuid;

use crate::models::{Favorite, OwnerId};

use super::{Store, StoreError};

impl Store {
    pub async fn list_chat_favorites(&self, owner: &OwnerId) -> Result<Vec<Favorite>, StoreError> {
        let rows = sqlx::query(
            "SELECT owner, session_id, message_id
             FROM chat_favorites
             WHERE owner = $1
             ORDER BY created_at ASC, id ASC",
        )
        .bind(owner.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let owner: String = row.try_get("owner")?;
                Ok(Favorite {
                    owner: OwnerId::new(owner),
                    session_id: row.try_get("session_id")?,
                    message_id: row.try_get("message_id")?,
                })
            })
            .collect()
    }

    pub async fn insert_chat_favorite(&self, favorite: &Favorite) -> Result<bool, StoreError> {
        // Both partial unique indexes are covered by the untargeted ON CONFLICT.
        let result = sqlx::query(
            "INSERT INTO chat_favorites (owner, session_id, message_id)
             VALUES ($1, $2, $3)
             ON CONFLICT DO NOTHING",
        )
        .bind(favorite.owner.as_str())
        .bind(favorite.session_id)
        .bind(favorite.message_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_chat_favorite(&self, favorite: &Favorite) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "DELETE FROM chat_favorites
             WHERE owner = $1
               AND session_id = $2
               AND message_id IS NOT DISTINCT FROM $3::uuid",
        )
        .bind(favorite.owner.as_str())
        .bind(favorite.session_id)
        .bind(favorite.message_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_chat_session_favorites(&self, session_id: Uuid) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "DELETE FROM chat_favorites
             WHERE session_id = $1",
        )
        .bind(session_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
