/// Category database models and operations
use crate::error::ApiResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

/// Category record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait CategoryStore: Send + Sync {
    async fn list(&self) -> ApiResult<Vec<Category>>;
    async fn find_by_id(&self, id: &str) -> ApiResult<Option<Category>>;
    async fn insert(&self, category: &Category) -> ApiResult<()>;
    async fn update(&self, category: &Category) -> ApiResult<()>;
    async fn delete(&self, id: &str) -> ApiResult<bool>;
}

fn category_from_row(row: &SqliteRow) -> ApiResult<Category> {
    Ok(Category {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        slug: row.try_get("slug")?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[derive(Clone)]
pub struct SqliteCategoryStore {
    db: SqlitePool,
}

impl SqliteCategoryStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CategoryStore for SqliteCategoryStore {
    async fn list(&self) -> ApiResult<Vec<Category>> {
        sqlx::query(
            "SELECT id, title, slug, created_by, created_at, updated_at
             FROM category ORDER BY title",
        )
        .fetch_all(&self.db)
        .await?
        .iter()
        .map(category_from_row)
        .collect()
    }

    async fn find_by_id(&self, id: &str) -> ApiResult<Option<Category>> {
        sqlx::query(
            "SELECT id, title, slug, created_by, created_at, updated_at
             FROM category WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .map(|row| category_from_row(&row))
        .transpose()
    }

    async fn insert(&self, category: &Category) -> ApiResult<()> {
        sqlx::query(
            "INSERT INTO category (id, title, slug, created_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&category.id)
        .bind(&category.title)
        .bind(&category.slug)
        .bind(&category.created_by)
        .bind(category.created_at)
        .bind(category.updated_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn update(&self, category: &Category) -> ApiResult<()> {
        sqlx::query("UPDATE category SET title = ?1, slug = ?2, updated_at = ?3 WHERE id = ?4")
            .bind(&category.title)
            .bind(&category.slug)
            .bind(category.updated_at)
            .bind(&category.id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    async fn delete(&self, id: &str) -> ApiResult<bool> {
        let result = sqlx::query("DELETE FROM category WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::error::ApiError;

    fn category(title: &str) -> Category {
        let now = Utc::now();
        Category {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.to_string(),
            slug: title.to_lowercase(),
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_list_delete() {
        let store = SqliteCategoryStore::new(test_pool().await);
        let rust = category("Rust");
        store.insert(&rust).await.unwrap();
        store.insert(&category("Go")).await.unwrap();

        let titles: Vec<_> = store.list().await.unwrap().into_iter().map(|c| c.title).collect();
        assert_eq!(titles, vec!["Go", "Rust"]);

        assert!(store.delete(&rust.id).await.unwrap());
        assert!(store.find_by_id(&rust.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_title_is_conflict() {
        let store = SqliteCategoryStore::new(test_pool().await);
        store.insert(&category("Rust")).await.unwrap();

        let err = store.insert(&category("Rust")).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(ref m) if m.contains("title")));
    }
}
