use crate::{
    content::{CategoryRequest},
    db::category::{Category, CategoryStore},
    error::{ApiError, ApiResult},
};
use chrono::Utc;
use std::sync::Arc;

const CATEGORY_MISSING: &str = "Category does not exist";

/// Category manager service
pub struct CategoryManager {
    categories: Arc<dyn CategoryStore>,
}

fn required_title(request: CategoryRequest) -> ApiResult<String> {
    let title = request.title.trim();
    if title.is_empty() {
        return Err(ApiError::BadRequest("Category title is required".to_string()));
    }
    Ok(title.to_string())
}

impl CategoryManager {
    pub fn new(categories: Arc<dyn CategoryStore>) -> Self {
        Self { categories }
    }

    pub async fn list(&self) -> ApiResult<Vec<Category>> {
        self.categories.list().await
    }

    pub async fn get(&self, id: &str) -> ApiResult<Category> {
        self.categories
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApiError::NotFound(CATEGORY_MISSING.to_string()))
    }

    pub async fn create(&self, created_by: &str, request: CategoryRequest) -> ApiResult<Category> {
        let title = required_title(request)?;
        let now = Utc::now();

        let category = Category {
            id: uuid::Uuid::new_v4().to_string(),
            slug: slug::slugify(&title),
            title,
            created_by: Some(created_by.to_string()),
            created_at: now,
            updated_at: now,
        };

        self.categories.insert(&category).await?;
        tracing::info!("Created category {} ({})", category.slug, category.id);
        Ok(category)
    }

    /// Rename a category. The slug follows the title only when it changed.
    pub async fn update(&self, id: &str, request: CategoryRequest) -> ApiResult<Category> {
        let title = required_title(request)?;
        let mut category = self.get(id).await?;

        if category.title != title {
            category.slug = slug::slugify(&title);
            category.title = title;
        }
        category.updated_at = Utc::now();

        self.categories.update(&category).await?;
        Ok(category)
    }

    /// Posts in the category keep existing, without a category
    pub async fn delete(&self, id: &str) -> ApiResult<()> {
        if !self.categories.delete(id).await? {
            return Err(ApiError::NotFound(CATEGORY_MISSING.to_string()));
        }

        tracing::info!("Deleted category {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{account::Role, category::SqliteCategoryStore, test_pool};
    use crate::testing::seed_account;

    async fn manager() -> (CategoryManager, String) {
        let pool = test_pool().await;
        let admin = seed_account(&pool, "admin", Role::Admin).await;
        (
            CategoryManager::new(Arc::new(SqliteCategoryStore::new(pool))),
            admin.id,
        )
    }

    fn titled(title: &str) -> CategoryRequest {
        CategoryRequest {
            title: title.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_derives_slug() {
        let (manager, admin) = manager().await;
        let category = manager.create(&admin, titled("Systems Programming")).await.unwrap();

        assert_eq!(category.slug, "systems-programming");
        assert_eq!(category.created_by.as_deref(), Some(admin.as_str()));
        assert_eq!(manager.get(&category.id).await.unwrap().title, "Systems Programming");
    }

    #[tokio::test]
    async fn test_non_latin_titles_are_transliterated() {
        let (manager, admin) = manager().await;

        let accented = manager.create(&admin, titled("Café Crème")).await.unwrap();
        assert_eq!(accented.slug, "cafe-creme");

        let japanese = manager.create(&admin, titled("日本語")).await.unwrap();
        assert!(!japanese.slug.is_empty());
        assert!(japanese
            .slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
    }

    #[tokio::test]
    async fn test_title_required() {
        let (manager, admin) = manager().await;
        let err = manager.create(&admin, titled("   ")).await.unwrap_err();
        assert_eq!(err.client_message(), "Category title is required");
    }

    #[tokio::test]
    async fn test_duplicate_title_conflicts() {
        let (manager, admin) = manager().await;
        manager.create(&admin, titled("Rust")).await.unwrap();

        let err = manager.create(&admin, titled("Rust")).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_update_keeps_slug_when_title_unchanged() {
        let (manager, admin) = manager().await;
        let mut category = manager.create(&admin, titled("Rust")).await.unwrap();

        // A slug edited out of band survives an update that keeps the title
        category.slug = "custom".to_string();
        manager.categories.update(&category).await.unwrap();

        let same = manager.update(&category.id, titled("Rust")).await.unwrap();
        assert_eq!(same.slug, "custom");

        let renamed = manager.update(&category.id, titled("Rust Async")).await.unwrap();
        assert_eq!(renamed.slug, "rust-async");
    }

    #[tokio::test]
    async fn test_missing_category() {
        let (manager, _) = manager().await;

        assert!(matches!(
            manager.get("nope").await.unwrap_err(),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            manager.delete("nope").await.unwrap_err(),
            ApiError::NotFound(_)
        ));
    }
}
