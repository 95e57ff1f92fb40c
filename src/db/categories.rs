use chrono::Utc;
use sqlx::Row;
use tracing::info;

use super::Database;
use crate::error::AppError;
use crate::models::Category;

const CATEGORY_COLUMNS: &str = "id, name, created_at";

impl Database {
    /// Insert-or-fetch by name. Races between duplicate deliveries of the
    /// same create request collapse onto the single existing row.
    pub async fn create_category(&self, name: &str) -> Result<Category, AppError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Validation(
                "category name must not be empty".to_string(),
            ));
        }

        sqlx::query("INSERT OR IGNORE INTO categories (name, created_at) VALUES (?1, ?2)")
            .bind(name)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        self.find_category_by_name(name)
            .await?
            .ok_or_else(|| AppError::Internal(format!("category {} missing after insert", name)))
    }

    pub async fn find_category_by_name(&self, name: &str) -> Result<Option<Category>, AppError> {
        let category = sqlx::query_as::<_, Category>(&format!(
            "SELECT {} FROM categories WHERE name = ?1",
            CATEGORY_COLUMNS
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(category)
    }

    pub async fn find_category_by_id(&self, id: i64) -> Result<Option<Category>, AppError> {
        let category = sqlx::query_as::<_, Category>(&format!(
            "SELECT {} FROM categories WHERE id = ?1",
            CATEGORY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(category)
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>, AppError> {
        let categories = sqlx::query_as::<_, Category>(&format!(
            "SELECT {} FROM categories ORDER BY name",
            CATEGORY_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }

    /// Delete a category. Every reference is nulled out first; dependents are
    /// never cascade-deleted.
    pub async fn delete_category(&self, id: i64) -> Result<(), AppError> {
        let category = self
            .find_category_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("category {} not found", id)))?;

        sqlx::query("UPDATE files SET category_id = NULL WHERE category_id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        sqlx::query("UPDATE user_settings SET category_id = NULL WHERE category_id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM categories WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        info!("deleted category {} ({})", category.name, id);
        Ok(())
    }

    /// Guarantee the "default" category exists. Checked before inserting so
    /// a legacy table without the unique name index does not accumulate
    /// duplicates across boots.
    pub async fn ensure_default_category(&self) -> Result<(), AppError> {
        if self.find_category_by_name("default").await?.is_none() {
            sqlx::query("INSERT OR IGNORE INTO categories (name, created_at) VALUES ('default', ?1)")
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    pub async fn count_categories_named(&self, name: &str) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM categories WHERE name = ?1")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }
}
