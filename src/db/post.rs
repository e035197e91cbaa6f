/// Post database models and operations
use crate::db::account::MediaRef;
use crate::error::ApiResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

/// Post record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub summary: String,
    pub body: String,
    pub category_id: Option<String>,
    pub author_id: String,
    pub featured_image: Option<MediaRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait PostStore: Send + Sync {
    async fn list(&self, category_id: Option<&str>) -> ApiResult<Vec<Post>>;
    async fn find_by_id(&self, id: &str) -> ApiResult<Option<Post>>;
    async fn insert(&self, post: &Post) -> ApiResult<()>;
    async fn update(&self, post: &Post) -> ApiResult<()>;
    async fn delete(&self, id: &str) -> ApiResult<bool>;
    /// Featured images of every post by this author
    async fn featured_images_by_author(&self, author_id: &str) -> ApiResult<Vec<MediaRef>>;
}

const POST_COLUMNS: &str = "id, title, slug, summary, body, category_id, author_id,
     featured_image_id, featured_image_url, created_at, updated_at";

fn post_from_row(row: &SqliteRow) -> ApiResult<Post> {
    let image_id: Option<String> = row.try_get("featured_image_id")?;
    let image_url: Option<String> = row.try_get("featured_image_url")?;

    Ok(Post {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        slug: row.try_get("slug")?,
        summary: row.try_get("summary")?,
        body: row.try_get("body")?,
        category_id: row.try_get("category_id")?,
        author_id: row.try_get("author_id")?,
        featured_image: image_id
            .zip(image_url)
            .map(|(public_id, url)| MediaRef { public_id, url }),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[derive(Clone)]
pub struct SqlitePostStore {
    db: SqlitePool,
}

impl SqlitePostStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PostStore for SqlitePostStore {
    async fn list(&self, category_id: Option<&str>) -> ApiResult<Vec<Post>> {
        let sql = format!(
            "SELECT {} FROM post WHERE (?1 IS NULL OR category_id = ?1) ORDER BY created_at DESC",
            POST_COLUMNS
        );

        sqlx::query(&sql)
            .bind(category_id)
            .fetch_all(&self.db)
            .await?
            .iter()
            .map(post_from_row)
            .collect()
    }

    async fn find_by_id(&self, id: &str) -> ApiResult<Option<Post>> {
        let sql = format!("SELECT {} FROM post WHERE id = ?1", POST_COLUMNS);

        sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .map(|row| post_from_row(&row))
            .transpose()
    }

    async fn insert(&self, post: &Post) -> ApiResult<()> {
        sqlx::query(
            "INSERT INTO post (id, title, slug, summary, body, category_id, author_id,
                               featured_image_id, featured_image_url, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )
        .bind(&post.id)
        .bind(&post.title)
        .bind(&post.slug)
        .bind(&post.summary)
        .bind(&post.body)
        .bind(&post.category_id)
        .bind(&post.author_id)
        .bind(post.featured_image.as_ref().map(|m| m.public_id.as_str()))
        .bind(post.featured_image.as_ref().map(|m| m.url.as_str()))
        .bind(post.created_at)
        .bind(post.updated_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn update(&self, post: &Post) -> ApiResult<()> {
        sqlx::query(
            "UPDATE post
             SET title = ?1, slug = ?2, summary = ?3, body = ?4, category_id = ?5,
                 featured_image_id = ?6, featured_image_url = ?7, updated_at = ?8
             WHERE id = ?9",
        )
        .bind(&post.title)
        .bind(&post.slug)
        .bind(&post.summary)
        .bind(&post.body)
        .bind(&post.category_id)
        .bind(post.featured_image.as_ref().map(|m| m.public_id.as_str()))
        .bind(post.featured_image.as_ref().map(|m| m.url.as_str()))
        .bind(post.updated_at)
        .bind(&post.id)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn delete(&self, id: &str) -> ApiResult<bool> {
        let result = sqlx::query("DELETE FROM post WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn featured_images_by_author(&self, author_id: &str) -> ApiResult<Vec<MediaRef>> {
        let rows = sqlx::query(
            "SELECT featured_image_id, featured_image_url FROM post
             WHERE author_id = ?1 AND featured_image_id IS NOT NULL",
        )
        .bind(author_id)
        .fetch_all(&self.db)
        .await?;

        rows.iter()
            .map(|row| -> ApiResult<MediaRef> {
                Ok(MediaRef {
                    public_id: row.try_get("featured_image_id")?,
                    url: row.try_get("featured_image_url")?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::account::{Account, AccountStore, SqliteAccountStore};
    use crate::db::test_pool;

    async fn author(pool: &SqlitePool) -> Account {
        let mut account = Account::new(
            "Author".to_string(),
            "author".to_string(),
            "author@example.com".to_string(),
            "secret1".to_string(),
        );
        account.password_hash = "hash".to_string();
        SqliteAccountStore::new(pool.clone())
            .insert(&account)
            .await
            .unwrap();
        account
    }

    fn post(title: &str, author_id: &str) -> Post {
        let now = Utc::now();
        Post {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.to_string(),
            slug: title.to_lowercase(),
            summary: "summary".to_string(),
            body: "body".to_string(),
            category_id: None,
            author_id: author_id.to_string(),
            featured_image: Some(MediaRef {
                public_id: format!("posts/{}", title),
                url: format!("http://media/posts/{}", title),
            }),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let pool = test_pool().await;
        let author = author(&pool).await;
        let store = SqlitePostStore::new(pool);

        let first = post("first", &author.id);
        store.insert(&first).await.unwrap();

        assert_eq!(store.find_by_id(&first.id).await.unwrap(), Some(first.clone()));
        assert_eq!(store.list(None).await.unwrap().len(), 1);
        assert!(store.list(Some("missing")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_featured_images_by_author() {
        let pool = test_pool().await;
        let author = author(&pool).await;
        let store = SqlitePostStore::new(pool);

        store.insert(&post("one", &author.id)).await.unwrap();
        store.insert(&post("two", &author.id)).await.unwrap();

        let images = store.featured_images_by_author(&author.id).await.unwrap();
        assert_eq!(images.len(), 2);
    }
}
