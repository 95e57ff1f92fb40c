//! Self-healing schema management for the metadata store.
//!
//! `ensure_schema` runs once per cold start, before any request handling.
//! Concurrent cold starts are resolved by optimistic retry-by-recheck, never
//! by locking: a failed additive change is re-checked against the live
//! schema, and "the column is there now" counts as success.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::{info, warn};

use super::Database;
use crate::error::AppError;
use crate::models::{StorageType, WaitingState};

const CATEGORIES_DDL: &str = r#"
    CREATE TABLE IF NOT EXISTS categories (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        created_at TEXT NOT NULL
    )"#;

const USER_SETTINGS_DDL: &str = r#"
    CREATE TABLE IF NOT EXISTS user_settings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        chat_id INTEGER NOT NULL UNIQUE,
        storage_type TEXT NOT NULL DEFAULT 'object',
        category_id INTEGER,
        custom_suffix TEXT,
        waiting_for TEXT NOT NULL DEFAULT 'none',
        created_at TEXT NOT NULL
    )"#;

const FILES_DDL: &str = r#"
    CREATE TABLE IF NOT EXISTS files (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        url TEXT NOT NULL,
        blob_ref TEXT NOT NULL,
        relay_message_id INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        file_name TEXT NOT NULL,
        file_size INTEGER NOT NULL DEFAULT 0,
        mime_type TEXT NOT NULL DEFAULT 'application/octet-stream',
        uploader_chat_id INTEGER NOT NULL DEFAULT 0,
        storage_type TEXT NOT NULL DEFAULT 'object',
        category_id INTEGER,
        custom_suffix TEXT
    )"#;

/// Additive column set: everything `ensure_column` can bolt onto an existing
/// table. Surrogate primary keys are excluded, they can only come from a
/// table rebuild.
const ENSURED_COLUMNS: &[(&str, &str, &str)] = &[
    ("categories", "name", "TEXT NOT NULL DEFAULT ''"),
    ("categories", "created_at", "TEXT NOT NULL DEFAULT ''"),
    ("user_settings", "chat_id", "INTEGER NOT NULL DEFAULT 0"),
    ("user_settings", "storage_type", "TEXT NOT NULL DEFAULT 'object'"),
    ("user_settings", "category_id", "INTEGER"),
    ("user_settings", "custom_suffix", "TEXT"),
    ("user_settings", "waiting_for", "TEXT NOT NULL DEFAULT 'none'"),
    ("user_settings", "created_at", "TEXT NOT NULL DEFAULT ''"),
    ("files", "url", "TEXT NOT NULL DEFAULT ''"),
    ("files", "blob_ref", "TEXT NOT NULL DEFAULT ''"),
    ("files", "relay_message_id", "INTEGER NOT NULL DEFAULT 0"),
    ("files", "created_at", "TEXT NOT NULL DEFAULT ''"),
    ("files", "file_name", "TEXT NOT NULL DEFAULT ''"),
    ("files", "file_size", "INTEGER NOT NULL DEFAULT 0"),
    (
        "files",
        "mime_type",
        "TEXT NOT NULL DEFAULT 'application/octet-stream'",
    ),
    ("files", "uploader_chat_id", "INTEGER NOT NULL DEFAULT 0"),
    ("files", "storage_type", "TEXT NOT NULL DEFAULT 'object'"),
    ("files", "category_id", "INTEGER"),
    ("files", "custom_suffix", "TEXT"),
];

fn table_ddl(table: &str) -> &'static str {
    match table {
        "categories" => CATEGORIES_DDL,
        "user_settings" => USER_SETTINGS_DDL,
        "files" => FILES_DDL,
        other => unreachable!("unknown table {}", other),
    }
}

fn required_columns(table: &str) -> &'static [&'static str] {
    match table {
        "categories" => &["id", "name", "created_at"],
        "user_settings" => &[
            "id",
            "chat_id",
            "storage_type",
            "category_id",
            "custom_suffix",
            "waiting_for",
            "created_at",
        ],
        "files" => &[
            "id",
            "url",
            "blob_ref",
            "relay_message_id",
            "created_at",
            "file_name",
            "file_size",
            "mime_type",
            "uploader_chat_id",
            "storage_type",
            "category_id",
            "custom_suffix",
        ],
        other => unreachable!("unknown table {}", other),
    }
}

impl Database {
    /// Create or heal the three metadata tables. Idempotent and safe under
    /// concurrent cold starts. Any failure here is fatal: the process must
    /// not serve requests against an unvalidated schema.
    pub async fn ensure_schema(&self) -> Result<(), AppError> {
        info!("ensuring metadata schema");

        for table in ["categories", "user_settings", "files"] {
            sqlx::query(table_ddl(table))
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    AppError::Schema(format!("failed to create table {}: {}", table, e))
                })?;
        }

        for (table, column, decl) in ENSURED_COLUMNS {
            self.ensure_column(table, column, decl).await?;
        }

        self.reconcile_legacy_columns().await?;
        self.validate_structure().await?;
        self.ensure_default_category().await?;

        Ok(())
    }

    /// Add `column` to `table` if it is not already there. A lost race with
    /// another instance shows up as a failed ALTER whose column exists on
    /// recheck; that is success, not an error.
    pub async fn ensure_column(
        &self,
        table: &str,
        column: &str,
        decl: &str,
    ) -> Result<(), AppError> {
        if self.column_exists(table, column).await? {
            return Ok(());
        }

        let alter = format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, decl);
        if let Err(e) = sqlx::query(&alter).execute(&self.pool).await {
            if self.column_exists(table, column).await? {
                warn!(
                    "column {}.{} appeared concurrently, continuing",
                    table, column
                );
                return Ok(());
            }
            return Err(AppError::Schema(format!(
                "failed to add column {}.{}: {}",
                table, column, e
            )));
        }

        info!("added missing column {}.{}", table, column);
        Ok(())
    }

    /// Fold the legacy `current_category_id` spelling into the canonical
    /// `category_id` column, then drop it. Must run before
    /// `validate_structure`.
    pub async fn reconcile_legacy_columns(&self) -> Result<(), AppError> {
        if !self.column_exists("user_settings", "current_category_id").await? {
            return Ok(());
        }

        info!("reconciling legacy column user_settings.current_category_id");

        sqlx::query(
            r#"UPDATE user_settings SET category_id = current_category_id
               WHERE category_id IS NULL AND current_category_id IS NOT NULL"#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Schema(format!("failed to copy legacy category ids: {}", e)))?;

        let drop = "ALTER TABLE user_settings DROP COLUMN current_category_id";
        if let Err(e) = sqlx::query(drop).execute(&self.pool).await {
            // Same recheck rule as ensure_column: a concurrent instance may
            // have dropped it already.
            if !self.column_exists("user_settings", "current_category_id").await? {
                return Ok(());
            }
            return Err(AppError::Schema(format!(
                "failed to drop legacy column current_category_id: {}",
                e
            )));
        }

        Ok(())
    }

    /// Confirm every table carries its full required column set; anything
    /// short is rebuilt from the canonical schema.
    pub async fn validate_structure(&self) -> Result<(), AppError> {
        for table in ["categories", "user_settings", "files"] {
            let present = self.column_names(table).await?;
            let missing: Vec<&str> = required_columns(table)
                .iter()
                .filter(|c| !present.iter().any(|p| p == *c))
                .copied()
                .collect();

            if !missing.is_empty() {
                warn!(
                    "table {} is missing columns {:?} after ensure pass, rebuilding",
                    table, missing
                );
                self.rebuild_table(table).await?;
            }
        }
        Ok(())
    }

    /// Dump all rows, recreate the table from the canonical schema, and
    /// reinsert row by row, substituting defaults for missing required
    /// fields. A single bad row is logged and skipped, never aborts the
    /// batch.
    pub async fn rebuild_table(&self, table: &str) -> Result<(), AppError> {
        let rows = sqlx::query(&format!("SELECT * FROM {}", table))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Schema(format!("failed to dump table {}: {}", table, e)))?;

        sqlx::query(&format!("DROP TABLE {}", table))
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Schema(format!("failed to drop table {}: {}", table, e)))?;

        sqlx::query(table_ddl(table))
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Schema(format!("failed to recreate table {}: {}", table, e)))?;

        let mut kept = 0usize;
        let mut skipped = 0usize;
        for row in &rows {
            let result = match table {
                "categories" => self.reinsert_category_row(row).await,
                "user_settings" => self.reinsert_user_setting_row(row).await,
                "files" => self.reinsert_file_row(row).await,
                other => unreachable!("unknown table {}", other),
            };
            match result {
                Ok(()) => kept += 1,
                Err(e) => {
                    skipped += 1;
                    warn!("skipping row during {} rebuild: {}", table, e);
                }
            }
        }

        info!(
            "rebuilt table {}: {} rows kept, {} skipped",
            table, kept, skipped
        );
        Ok(())
    }

    pub(crate) async fn column_exists(&self, table: &str, column: &str) -> Result<bool, AppError> {
        Ok(self.column_names(table).await?.iter().any(|c| c == column))
    }

    async fn column_names(&self, table: &str) -> Result<Vec<String>, AppError> {
        let rows = sqlx::query(&format!("PRAGMA table_info({})", table))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .filter_map(|row| row.try_get::<String, _>("name").ok())
            .collect())
    }

    async fn reinsert_category_row(&self, row: &SqliteRow) -> Result<(), AppError> {
        let name: String = row
            .try_get("name")
            .map_err(|_| AppError::Validation("row has no usable name".to_string()))?;
        let created_at = date_or_now(row, "created_at");

        sqlx::query("INSERT INTO categories (id, name, created_at) VALUES (?1, ?2, ?3)")
            .bind(row.try_get::<i64, _>("id").ok())
            .bind(name)
            .bind(created_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn reinsert_user_setting_row(&self, row: &SqliteRow) -> Result<(), AppError> {
        let chat_id: i64 = row
            .try_get("chat_id")
            .map_err(|_| AppError::Validation("row has no usable chat_id".to_string()))?;

        sqlx::query(
            r#"INSERT INTO user_settings
               (id, chat_id, storage_type, category_id, custom_suffix, waiting_for, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
        )
        .bind(row.try_get::<i64, _>("id").ok())
        .bind(chat_id)
        .bind(storage_type_or_default(row).to_string())
        .bind(row.try_get::<Option<i64>, _>("category_id").unwrap_or(None))
        .bind(
            row.try_get::<Option<String>, _>("custom_suffix")
                .unwrap_or(None),
        )
        .bind(waiting_state_or_default(row).to_string())
        .bind(date_or_now(row, "created_at"))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn reinsert_file_row(&self, row: &SqliteRow) -> Result<(), AppError> {
        let url: String = row
            .try_get("url")
            .map_err(|_| AppError::Validation("row has no usable url".to_string()))?;
        let blob_ref: String = row
            .try_get("blob_ref")
            .map_err(|_| AppError::Validation("row has no usable blob_ref".to_string()))?;
        let file_name: String = row.try_get("file_name").unwrap_or_default();

        sqlx::query(
            r#"INSERT INTO files
               (id, url, blob_ref, relay_message_id, created_at, file_name, file_size,
                mime_type, uploader_chat_id, storage_type, category_id, custom_suffix)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"#,
        )
        .bind(row.try_get::<i64, _>("id").ok())
        .bind(url)
        .bind(blob_ref)
        .bind(row.try_get::<i64, _>("relay_message_id").unwrap_or(0))
        .bind(date_or_now(row, "created_at"))
        .bind(file_name)
        .bind(row.try_get::<i64, _>("file_size").unwrap_or(0))
        .bind(
            row.try_get::<String, _>("mime_type")
                .unwrap_or_else(|_| "application/octet-stream".to_string()),
        )
        .bind(row.try_get::<i64, _>("uploader_chat_id").unwrap_or(0))
        .bind(storage_type_or_default(row).to_string())
        .bind(row.try_get::<Option<i64>, _>("category_id").unwrap_or(None))
        .bind(
            row.try_get::<Option<String>, _>("custom_suffix")
                .unwrap_or(None),
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn date_or_now(row: &SqliteRow, column: &str) -> DateTime<Utc> {
    row.try_get::<DateTime<Utc>, _>(column)
        .unwrap_or_else(|_| Utc::now())
}

fn storage_type_or_default(row: &SqliteRow) -> StorageType {
    row.try_get::<String, _>("storage_type")
        .ok()
        .and_then(|s| StorageType::try_from(s).ok())
        .unwrap_or_default()
}

fn waiting_state_or_default(row: &SqliteRow) -> WaitingState {
    row.try_get::<String, _>("waiting_for")
        .ok()
        .and_then(|s| WaitingState::try_from(s).ok())
        .unwrap_or_default()
}
