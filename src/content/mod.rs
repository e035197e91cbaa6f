/// Blog content: categories and posts
mod category;
mod post;

pub use category::CategoryManager;
pub use post::PostManager;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Create or rename a category
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryRequest {
    pub title: String,
}

/// New post (multipart text fields)
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PostRequest {
    #[validate(length(min = 1, message = "Please provide a title"))]
    pub title: String,
    #[validate(length(min = 1, message = "Please provide a summary"))]
    pub summary: String,
    #[validate(length(min = 1, message = "Please provide a body"))]
    pub body: String,
    #[validate(length(min = 1, message = "Please provide a category"))]
    pub category: String,
}

/// Post update; absent fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PostUpdateRequest {
    #[validate(length(min = 1, message = "Please provide a title"))]
    pub title: Option<String>,
    #[validate(length(min = 1, message = "Please provide a summary"))]
    pub summary: Option<String>,
    #[validate(length(min = 1, message = "Please provide a body"))]
    pub body: Option<String>,
    #[validate(length(min = 1, message = "Please provide a category"))]
    pub category: Option<String>,
}
