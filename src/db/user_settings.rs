use chrono::Utc;

use super::Database;
use crate::error::AppError;
use crate::models::{StorageType, UserSetting, WaitingState};

const USER_SETTING_COLUMNS: &str =
    "id, chat_id, storage_type, category_id, custom_suffix, waiting_for, created_at";

impl Database {
    /// Upsert-on-read: every inbound chat event goes through here before any
    /// transition logic runs. Races between two first contacts collapse onto
    /// the unique chat_id row.
    pub async fn get_or_create_user_setting(
        &self,
        chat_id: i64,
        default_storage: StorageType,
    ) -> Result<UserSetting, AppError> {
        sqlx::query(
            r#"INSERT OR IGNORE INTO user_settings (chat_id, storage_type, waiting_for, created_at)
               VALUES (?1, ?2, ?3, ?4)"#,
        )
        .bind(chat_id)
        .bind(default_storage.to_string())
        .bind(WaitingState::None.to_string())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        self.find_user_setting(chat_id).await?.ok_or_else(|| {
            AppError::Internal(format!("user setting for chat {} missing after upsert", chat_id))
        })
    }

    pub async fn find_user_setting(&self, chat_id: i64) -> Result<Option<UserSetting>, AppError> {
        let setting = sqlx::query_as::<_, UserSetting>(&format!(
            "SELECT {} FROM user_settings WHERE chat_id = ?1",
            USER_SETTING_COLUMNS
        ))
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(setting)
    }

    pub async fn set_waiting_state(
        &self,
        chat_id: i64,
        state: WaitingState,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE user_settings SET waiting_for = ?1 WHERE chat_id = ?2")
            .bind(state.to_string())
            .bind(chat_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_storage_type(
        &self,
        chat_id: i64,
        storage_type: StorageType,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE user_settings SET storage_type = ?1 WHERE chat_id = ?2")
            .bind(storage_type.to_string())
            .bind(chat_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_user_category(
        &self,
        chat_id: i64,
        category_id: Option<i64>,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE user_settings SET category_id = ?1 WHERE chat_id = ?2")
            .bind(category_id)
            .bind(chat_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_custom_suffix(
        &self,
        chat_id: i64,
        suffix: Option<&str>,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE user_settings SET custom_suffix = ?1 WHERE chat_id = ?2")
            .bind(suffix)
            .bind(chat_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
