//! Image association between storage keys and properties.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use crate::db::error::{is_unique_violation, DbError, DbResult};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    /// Storage key; globally unique across all properties
    pub key: String,
    pub property_id: i64,
}

impl Image {
    /// Record that `key` belongs to `property_id`.
    ///
    /// Fails with `Conflict` if the key is already associated with any property.
    pub async fn create(db: &SqlitePool, key: &str, property_id: i64) -> DbResult<Image> {
        let duplicate: Option<(String,)> = sqlx::query_as("SELECT key FROM images WHERE key = ?")
            .bind(key)
            .fetch_optional(db)
            .await?;

        if duplicate.is_some() {
            return Err(duplicate_key(key));
        }

        sqlx::query_as::<_, Image>(
            "INSERT INTO images (key, property_id) VALUES (?, ?) RETURNING key, property_id",
        )
        .bind(key)
        .bind(property_id)
        .fetch_one(db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                duplicate_key(key)
            } else {
                DbError::Database(e)
            }
        })
    }

    /// Drop the association for `key`. Removing an absent key is not an error.
    pub async fn remove(db: &SqlitePool, key: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM images WHERE key = ?")
            .bind(key)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Storage keys for a property, ordered by key
    pub async fn keys_for_property(db: &SqlitePool, property_id: i64) -> DbResult<Vec<String>> {
        let keys: Vec<String> =
            sqlx::query_scalar("SELECT key FROM images WHERE property_id = ? ORDER BY key")
                .bind(property_id)
                .fetch_all(db)
                .await?;

        Ok(keys)
    }
}

fn duplicate_key(key: &str) -> DbError {
    DbError::Conflict(format!("Duplicate image: {}", key))
}
