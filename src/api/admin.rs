/// Account administration endpoints (/admin/*)
use crate::{
    api::{response::ApiResponse, JsonBody},
    auth::AdminUser,
    context::AppContext,
    db::account::{PublicAccount, Role},
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;

pub fn routes() -> Router<AppContext> {
    Router::new().route("/users", get(list_users)).route(
        "/users/:user_id",
        get(get_user).patch(update_user_role).delete(delete_user),
    )
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RoleUpdateRequest {
    role: String,
}

async fn list_users(
    State(ctx): State<AppContext>,
    _admin: AdminUser,
) -> ApiResult<ApiResponse<Vec<PublicAccount>>> {
    let users = ctx.account_manager.list_accounts().await?;
    Ok(ApiResponse::ok("Fetched all the users", users))
}

async fn get_user(
    State(ctx): State<AppContext>,
    _admin: AdminUser,
    Path(user_id): Path<String>,
) -> ApiResult<ApiResponse<PublicAccount>> {
    let user = ctx.account_manager.get_account(&user_id).await?;
    Ok(ApiResponse::ok("User fetched successfully", user))
}

async fn update_user_role(
    State(ctx): State<AppContext>,
    _admin: AdminUser,
    Path(user_id): Path<String>,
    WithRejection(Json(request), _): JsonBody<RoleUpdateRequest>,
) -> ApiResult<ApiResponse<PublicAccount>> {
    let role = Role::parse(&request.role).ok_or_else(|| {
        ApiError::BadRequest("Role must be either user or admin".to_string())
    })?;

    let user = ctx.account_manager.set_role(&user_id, role).await?;
    Ok(ApiResponse::ok("User role updated successfully", user))
}

/// Deletes the account, its profile images, and the featured images of its posts
async fn delete_user(
    State(ctx): State<AppContext>,
    _admin: AdminUser,
    Path(user_id): Path<String>,
) -> ApiResult<ApiResponse<()>> {
    // Existence check first so an unknown id is a 404 before any media is touched
    ctx.account_manager.get_account(&user_id).await?;

    let discarded = ctx.post_manager.delete_media_for_author(&user_id).await?;
    tracing::debug!("Discarded {} featured images of account {}", discarded, user_id);

    ctx.account_manager.delete_account(&user_id).await?;
    Ok(ApiResponse::message("User deleted successfully"))
}
