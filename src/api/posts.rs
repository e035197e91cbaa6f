/// Post endpoints (/posts/*)
use crate::{
    api::{response::ApiResponse, JsonBody},
    auth::AuthUser,
    content::{PostRequest, PostUpdateRequest},
    context::AppContext,
    db::post::Post,
    error::ApiResult,
    uploads::MultipartForm,
};
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/", get(list_posts).post(create_post))
        .route(
            "/:post_id",
            get(get_post).patch(update_post).delete(delete_post),
        )
}

#[derive(Debug, Deserialize)]
struct ListPostsParams {
    category: Option<String>,
}

async fn list_posts(
    State(ctx): State<AppContext>,
    _user: AuthUser,
    Query(params): Query<ListPostsParams>,
) -> ApiResult<ApiResponse<Vec<Post>>> {
    let posts = ctx.post_manager.list(params.category.as_deref()).await?;
    Ok(ApiResponse::ok("Fetched all the posts", posts))
}

async fn get_post(
    State(ctx): State<AppContext>,
    _user: AuthUser,
    Path(post_id): Path<String>,
) -> ApiResult<ApiResponse<Post>> {
    let post = ctx.post_manager.get(&post_id).await?;
    Ok(ApiResponse::ok("Fetched single post successfully", post))
}

/// Multipart form with the post fields and a `featuredImage` file
async fn create_post(
    State(ctx): State<AppContext>,
    user: AuthUser,
    form: MultipartForm,
) -> ApiResult<ApiResponse<Post>> {
    let request = PostRequest {
        title: form.text_or_empty("title"),
        summary: form.text_or_empty("summary"),
        body: form.text_or_empty("body"),
        category: form.text_or_empty("category"),
    };

    let result = ctx
        .post_manager
        .create(user.id(), request, form.files.path("featuredImage"))
        .await;
    form.files.cleanup();

    Ok(ApiResponse::created("Post created successfully", result?))
}

async fn update_post(
    State(ctx): State<AppContext>,
    user: AuthUser,
    Path(post_id): Path<String>,
    WithRejection(Json(request), _): JsonBody<PostUpdateRequest>,
) -> ApiResult<ApiResponse<Post>> {
    let post = ctx
        .post_manager
        .update(&post_id, &user.account, request)
        .await?;
    Ok(ApiResponse::ok("Post updated successfully", post))
}

async fn delete_post(
    State(ctx): State<AppContext>,
    user: AuthUser,
    Path(post_id): Path<String>,
) -> ApiResult<ApiResponse<()>> {
    ctx.post_manager.delete(&post_id, &user.account).await?;
    Ok(ApiResponse::message("Post deleted successfully"))
}
