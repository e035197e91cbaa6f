/// Category endpoints (/categories/*), admin only
use crate::{
    api::{response::ApiResponse, JsonBody},
    auth::AdminUser,
    content::CategoryRequest,
    context::AppContext,
    db::category::Category,
    error::ApiResult,
};
use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use axum_extra::extract::WithRejection;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route(
            "/:category_id",
            get(get_category)
                .patch(update_category)
                .delete(delete_category),
        )
}

async fn list_categories(
    State(ctx): State<AppContext>,
    _admin: AdminUser,
) -> ApiResult<ApiResponse<Vec<Category>>> {
    let categories = ctx.category_manager.list().await?;
    Ok(ApiResponse::ok("Fetched all the categories", categories))
}

async fn get_category(
    State(ctx): State<AppContext>,
    _admin: AdminUser,
    Path(category_id): Path<String>,
) -> ApiResult<ApiResponse<Category>> {
    let category = ctx.category_manager.get(&category_id).await?;
    Ok(ApiResponse::ok("Fetched category successfully", category))
}

async fn create_category(
    State(ctx): State<AppContext>,
    admin: AdminUser,
    WithRejection(Json(request), _): JsonBody<CategoryRequest>,
) -> ApiResult<ApiResponse<Category>> {
    let category = ctx
        .category_manager
        .create(&admin.account.id, request)
        .await?;
    Ok(ApiResponse::created("Category created successfully", category))
}

async fn update_category(
    State(ctx): State<AppContext>,
    _admin: AdminUser,
    Path(category_id): Path<String>,
    WithRejection(Json(request), _): JsonBody<CategoryRequest>,
) -> ApiResult<ApiResponse<Category>> {
    let category = ctx.category_manager.update(&category_id, request).await?;
    Ok(ApiResponse::ok("Category updated successfully", category))
}

async fn delete_category(
    State(ctx): State<AppContext>,
    _admin: AdminUser,
    Path(category_id): Path<String>,
) -> ApiResult<ApiResponse<()>> {
    ctx.category_manager.delete(&category_id).await?;
    Ok(ApiResponse::message("Category deleted successfully"))
}
