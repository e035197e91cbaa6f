/// Account endpoints (/user/*)
use crate::{
    account::{
        ForgotPasswordRequest, LoginRequest, LoginResponse, PasswordChangeRequest, ProfileImage,
        ProfileUpdateRequest, RefreshRequest, SessionTokens, SignupRequest,
    },
    api::{response::ApiResponse, JsonBody},
    auth::{AuthUser, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE},
    context::AppContext,
    db::account::PublicAccount,
    error::ApiResult,
    uploads::MultipartForm,
};
use axum::{
    extract::{Path, State},
    routing::{get, patch, post},
    Json, Router,
};
use axum_extra::extract::{
    cookie::{Cookie, CookieJar},
    WithRejection,
};

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", get(logout).post(logout))
        .route("/refresh-token", post(refresh_token))
        .route("/profile", get(profile))
        .route("/change-password", post(change_password))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password/:token", post(reset_password))
        .route("/update-profile", patch(update_profile))
        .route("/update-avatar", patch(update_avatar))
        .route("/update-coverImage", patch(update_cover_image))
}

fn session_cookie(name: &'static str, value: String) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(true)
        .path("/")
        .build()
}

fn with_session(jar: CookieJar, tokens: &SessionTokens) -> CookieJar {
    jar.add(session_cookie(ACCESS_TOKEN_COOKIE, tokens.access_token.clone()))
        .add(session_cookie(REFRESH_TOKEN_COOKIE, tokens.refresh_token.clone()))
}

fn without_session(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(ACCESS_TOKEN_COOKIE).path("/"))
        .remove(Cookie::build(REFRESH_TOKEN_COOKIE).path("/"))
}

/// Create an account from a multipart form with `avatar` and optional `coverImage`
async fn signup(
    State(ctx): State<AppContext>,
    form: MultipartForm,
) -> ApiResult<ApiResponse<PublicAccount>> {
    let request = SignupRequest {
        name: form.text_or_empty("name"),
        username: form.text_or_empty("username"),
        email: form.text_or_empty("email"),
        password: form.text_or_empty("password"),
    };

    let result = ctx
        .account_manager
        .signup(
            request,
            form.files.path("avatar"),
            form.files.path("coverImage"),
        )
        .await;
    form.files.cleanup();

    Ok(ApiResponse::created("User created successfully", result?))
}

async fn login(
    State(ctx): State<AppContext>,
    jar: CookieJar,
    WithRejection(Json(request), _): JsonBody<LoginRequest>,
) -> ApiResult<(CookieJar, ApiResponse<LoginResponse>)> {
    let response = ctx.account_manager.login(request).await?;
    let jar = with_session(jar, &response.tokens);

    Ok((jar, ApiResponse::ok("Login successfully", response)))
}

async fn logout(
    State(ctx): State<AppContext>,
    user: AuthUser,
    jar: CookieJar,
) -> ApiResult<(CookieJar, ApiResponse<()>)> {
    ctx.account_manager.logout(user.id()).await?;

    Ok((
        without_session(jar),
        ApiResponse::message("user has been logged out"),
    ))
}

/// Refresh token from the `refreshToken` cookie, else the JSON body
async fn refresh_token(
    State(ctx): State<AppContext>,
    jar: CookieJar,
    body: Option<Json<RefreshRequest>>,
) -> ApiResult<(CookieJar, ApiResponse<SessionTokens>)> {
    let presented = jar
        .get(REFRESH_TOKEN_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
        .or_else(|| body.and_then(|Json(request)| request.refresh_token));

    let tokens = ctx.account_manager.refresh(presented).await?;
    let jar = with_session(jar, &tokens);

    Ok((jar, ApiResponse::ok("Access Token refreshed", tokens)))
}

async fn profile(
    State(ctx): State<AppContext>,
    user: AuthUser,
) -> ApiResult<ApiResponse<PublicAccount>> {
    let account = ctx.account_manager.profile(user.id()).await?;
    Ok(ApiResponse::ok("Fetched user data successfully", account))
}

async fn change_password(
    State(ctx): State<AppContext>,
    user: AuthUser,
    WithRejection(Json(request), _): JsonBody<PasswordChangeRequest>,
) -> ApiResult<ApiResponse<()>> {
    ctx.account_manager
        .change_password(user.id(), request)
        .await?;
    Ok(ApiResponse::message("Password has been updated successfully"))
}

async fn forgot_password(
    State(ctx): State<AppContext>,
    WithRejection(Json(request), _): JsonBody<ForgotPasswordRequest>,
) -> ApiResult<ApiResponse<()>> {
    ctx.account_manager.forgot_password(request).await?;
    Ok(ApiResponse::message(
        "Password reset link has been sent to your email",
    ))
}

async fn reset_password(
    State(ctx): State<AppContext>,
    Path(token): Path<String>,
    WithRejection(Json(request), _): JsonBody<PasswordChangeRequest>,
) -> ApiResult<ApiResponse<()>> {
    ctx.account_manager.reset_password(&token, request).await?;
    Ok(ApiResponse::message(
        "Password has been reset successfully. You can now login",
    ))
}

async fn update_profile(
    State(ctx): State<AppContext>,
    user: AuthUser,
    WithRejection(Json(request), _): JsonBody<ProfileUpdateRequest>,
) -> ApiResult<ApiResponse<PublicAccount>> {
    let account = ctx.account_manager.update_profile(user.id(), request).await?;
    Ok(ApiResponse::ok("Profile updated successfully", account))
}

async fn replace_image(
    ctx: &AppContext,
    user: &AuthUser,
    form: MultipartForm,
    image: ProfileImage,
    field: &str,
) -> ApiResult<PublicAccount> {
    let result = ctx
        .account_manager
        .update_profile_image(user.id(), image, form.files.path(field))
        .await;
    form.files.cleanup();
    result
}

async fn update_avatar(
    State(ctx): State<AppContext>,
    user: AuthUser,
    form: MultipartForm,
) -> ApiResult<ApiResponse<PublicAccount>> {
    let account = replace_image(&ctx, &user, form, ProfileImage::Avatar, "avatar").await?;
    Ok(ApiResponse::ok("Profile image updated successfully", account))
}

async fn update_cover_image(
    State(ctx): State<AppContext>,
    user: AuthUser,
    form: MultipartForm,
) -> ApiResult<ApiResponse<PublicAccount>> {
    let account =
        replace_image(&ctx, &user, form, ProfileImage::CoverImage, "coverImage").await?;
    Ok(ApiResponse::ok("Cover image updated successfully", account))
}
