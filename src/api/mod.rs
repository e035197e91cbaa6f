/// API routes and handlers
pub mod admin;
pub mod categories;
pub mod health;
pub mod middleware;
pub mod posts;
pub mod response;
pub mod users;

use crate::{context::AppContext, error::ApiError};
use axum::{Json, Router};
use axum_extra::extract::WithRejection;

/// JSON body whose rejections render as the error envelope
pub type JsonBody<T> = WithRejection<Json<T>, ApiError>;

/// Build API routes, all under `/api/v1`
pub fn routes() -> Router<AppContext> {
    let v1 = Router::new()
        .nest("/user", users::routes())
        .nest("/categories", categories::routes())
        .nest("/posts", posts::routes())
        .nest("/admin", admin::routes());

    Router::new()
        .merge(health::routes())
        .nest("/api/v1", v1)
}
