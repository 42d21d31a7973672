//! Database layer for image-batch-dl
//!
//! Handles SQLite persistence for user settings.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] - Database lifecycle, schema migrations
//! - [`settings`] - Key/value settings rows

use sqlx::{FromRow, sqlite::SqlitePool};

mod migrations;
mod settings;

/// Settings row from database
#[derive(Debug, Clone, FromRow)]
pub struct SettingRow {
    /// Setting key
    pub key: String,
    /// JSON-encoded value
    pub value: String,
    /// Unix timestamp of the last write
    pub updated_at: i64,
}

/// Database handle for image-batch-dl
pub struct Database {
    pool: SqlitePool,
}
