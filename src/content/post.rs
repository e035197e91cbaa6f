use crate::{
    content::{PostRequest, PostUpdateRequest},
    db::{
        account::Account,
        category::CategoryStore,
        post::{Post, PostStore},
    },
    error::{ApiError, ApiResult},
    media::{MediaFolder, MediaStore},
};
use chrono::Utc;
use std::{path::Path, sync::Arc};
use validator::Validate;

const POST_MISSING: &str = "Post does not exist";

/// Post manager service
pub struct PostManager {
    posts: Arc<dyn PostStore>,
    categories: Arc<dyn CategoryStore>,
    media: Arc<dyn MediaStore>,
}

impl PostManager {
    pub fn new(
        posts: Arc<dyn PostStore>,
        categories: Arc<dyn CategoryStore>,
        media: Arc<dyn MediaStore>,
    ) -> Self {
        Self {
            posts,
            categories,
            media,
        }
    }

    async fn ensure_category(&self, id: &str) -> ApiResult<()> {
        match self.categories.find_by_id(id).await? {
            Some(_) => Ok(()),
            None => Err(ApiError::NotFound("Category does not exist".to_string())),
        }
    }

    /// Load a post the actor may modify: its author, or an admin
    async fn owned(&self, id: &str, actor: &Account) -> ApiResult<Post> {
        let post = self.get(id).await?;

        if post.author_id != actor.id && !actor.is_admin() {
            return Err(ApiError::Forbidden(
                "You are not allowed to modify this post".to_string(),
            ));
        }

        Ok(post)
    }

    async fn discard_media(&self, public_id: &str) {
        if let Err(e) = self.media.delete(public_id).await {
            tracing::warn!("Failed to discard media {}: {}", public_id, e);
        }
    }

    /// Posts, newest first, optionally limited to one category
    pub async fn list(&self, category_id: Option<&str>) -> ApiResult<Vec<Post>> {
        self.posts.list(category_id).await
    }

    pub async fn get(&self, id: &str) -> ApiResult<Post> {
        self.posts
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApiError::NotFound(POST_MISSING.to_string()))
    }

    /// Publish a post. The featured image is uploaded last and discarded
    /// again if the post cannot be stored.
    pub async fn create(
        &self,
        author_id: &str,
        request: PostRequest,
        featured_image: Option<&Path>,
    ) -> ApiResult<Post> {
        request.validate()?;

        let featured_image = featured_image
            .ok_or_else(|| ApiError::BadRequest("Please select a featured image".to_string()))?;

        self.ensure_category(&request.category).await?;

        let media = self
            .media
            .upload(featured_image, MediaFolder::FeaturedImage)
            .await?;

        let now = Utc::now();
        let post = Post {
            id: uuid::Uuid::new_v4().to_string(),
            slug: slug::slugify(&request.title),
            title: request.title,
            summary: request.summary,
            body: request.body,
            category_id: Some(request.category),
            author_id: author_id.to_string(),
            featured_image: Some(media),
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = self.posts.insert(&post).await {
            if let Some(media) = &post.featured_image {
                self.discard_media(&media.public_id).await;
            }
            return Err(e);
        }

        tracing::info!("Created post {} ({}) by {}", post.slug, post.id, author_id);
        Ok(post)
    }

    pub async fn update(
        &self,
        id: &str,
        actor: &Account,
        request: PostUpdateRequest,
    ) -> ApiResult<Post> {
        request.validate()?;

        let mut post = self.owned(id, actor).await?;

        if let Some(category) = request.category {
            self.ensure_category(&category).await?;
            post.category_id = Some(category);
        }
        if let Some(title) = request.title {
            if title != post.title {
                post.slug = slug::slugify(&title);
                post.title = title;
            }
        }
        if let Some(summary) = request.summary {
            post.summary = summary;
        }
        if let Some(body) = request.body {
            post.body = body;
        }
        post.updated_at = Utc::now();

        self.posts.update(&post).await?;
        Ok(post)
    }

    /// Remove a post and its featured image
    pub async fn delete(&self, id: &str, actor: &Account) -> ApiResult<()> {
        let post = self.owned(id, actor).await?;

        if !self.posts.delete(&post.id).await? {
            return Err(ApiError::NotFound(POST_MISSING.to_string()));
        }

        if let Some(media) = &post.featured_image {
            self.discard_media(&media.public_id).await;
        }

        tracing::info!("Deleted post {}", id);
        Ok(())
    }

    /// Discard the featured images of every post by `author_id`.
    /// Runs before the author is deleted; the posts go with the account.
    pub async fn delete_media_for_author(&self, author_id: &str) -> ApiResult<usize> {
        let images = self.posts.featured_images_by_author(author_id).await?;

        for media in &images {
            self.discard_media(&media.public_id).await;
        }

        Ok(images.len())
    }
}
