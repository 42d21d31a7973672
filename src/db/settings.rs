//! Settings rows: one JSON document per key.

use crate::error::DatabaseError;
use crate::{Error, Result};

use super::{Database, SettingRow};

impl Database {
    /// Read a setting row by key
    pub async fn get_setting(&self, key: &str) -> Result<Option<SettingRow>> {
        sqlx::query_as::<_, SettingRow>(
            "SELECT key, value, updated_at FROM settings WHERE key = ?",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to read setting '{}': {}",
                key, e
            )))
        })
    }

    /// Insert or replace a setting value
    pub async fn put_setting(&self, key: &str, value: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO settings (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to write setting '{}': {}",
                key, e
            )))
        })?;

        Ok(())
    }

    /// Remove a setting. Returns whether a row existed.
    pub async fn delete_setting(&self, key: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM settings WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to delete setting '{}': {}",
                    key, e
                )))
            })?;

        Ok(result.rows_affected() > 0)
    }
}
