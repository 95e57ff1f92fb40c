use chrono::Utc;

use super::Database;
use crate::error::AppError;
use crate::models::{FileRecord, NewFileRecord};

const FILE_COLUMNS: &str = "id, url, blob_ref, relay_message_id, created_at, file_name, \
     file_size, mime_type, uploader_chat_id, storage_type, category_id, custom_suffix";

impl Database {
    pub async fn insert_file_record(&self, record: &NewFileRecord) -> Result<FileRecord, AppError> {
        let result = sqlx::query(
            r#"INSERT INTO files
               (url, blob_ref, relay_message_id, created_at, file_name, file_size,
                mime_type, uploader_chat_id, storage_type, category_id, custom_suffix)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"#,
        )
        .bind(&record.url)
        .bind(&record.blob_ref)
        .bind(record.relay_message_id)
        .bind(Utc::now())
        .bind(&record.file_name)
        .bind(record.file_size)
        .bind(&record.mime_type)
        .bind(record.uploader_chat_id)
        .bind(record.storage_type.to_string())
        .bind(record.category_id)
        .bind(&record.custom_suffix)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        self.find_file_by_id(id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("file record {} missing after insert", id)))
    }

    pub async fn find_file_by_id(&self, id: i64) -> Result<Option<FileRecord>, AppError> {
        let record = sqlx::query_as::<_, FileRecord>(&format!(
            "SELECT {} FROM files WHERE id = ?1",
            FILE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    pub async fn find_file_by_url(&self, url: &str) -> Result<Option<FileRecord>, AppError> {
        let record = sqlx::query_as::<_, FileRecord>(&format!(
            "SELECT {} FROM files WHERE url = ?1 ORDER BY created_at DESC LIMIT 1",
            FILE_COLUMNS
        ))
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    pub async fn find_file_by_blob_ref(&self, blob_ref: &str) -> Result<Option<FileRecord>, AppError> {
        let record = sqlx::query_as::<_, FileRecord>(&format!(
            "SELECT {} FROM files WHERE blob_ref = ?1 ORDER BY created_at DESC LIMIT 1",
            FILE_COLUMNS
        ))
        .bind(blob_ref)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    pub async fn find_file_by_file_name(&self, file_name: &str) -> Result<Option<FileRecord>, AppError> {
        let record = sqlx::query_as::<_, FileRecord>(&format!(
            "SELECT {} FROM files WHERE file_name = ?1 ORDER BY created_at DESC LIMIT 1",
            FILE_COLUMNS
        ))
        .bind(file_name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    /// Locator and backend reference always move together; reading one
    /// without the other is meaningless.
    pub async fn update_file_locator(
        &self,
        id: i64,
        url: &str,
        blob_ref: &str,
        custom_suffix: Option<&str>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE files SET url = ?1, blob_ref = ?2, custom_suffix = ?3 WHERE id = ?4",
        )
        .bind(url)
        .bind(blob_ref)
        .bind(custom_suffix)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_file(&self, id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM files WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn list_files(&self, limit: i64, offset: i64) -> Result<Vec<FileRecord>, AppError> {
        let records = sqlx::query_as::<_, FileRecord>(&format!(
            "SELECT {} FROM files ORDER BY created_at DESC LIMIT ?1 OFFSET ?2",
            FILE_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }
}
