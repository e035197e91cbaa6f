/// Authentication primitives and request extractors
pub mod password;
pub mod reset;
pub mod tokens;

use crate::{
    api::middleware::extract_bearer_token,
    context::AppContext,
    db::account::Account,
    error::ApiError,
};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts, http::HeaderMap};
use axum_extra::extract::cookie::CookieJar;

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

/// Access token from the `accessToken` cookie, else the bearer header
pub fn extract_access_token(headers: &HeaderMap) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(ACCESS_TOKEN_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
        .or_else(|| extract_bearer_token(headers))
}

/// Authenticated account resolved from the access token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub account: Account,
}

impl AuthUser {
    pub fn id(&self) -> &str {
        &self.account.id
    }
}

#[async_trait]
impl FromRequestParts<AppContext> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_access_token(&parts.headers)
            .ok_or_else(|| ApiError::Unauthorized("Unauthorized request".to_string()))?;

        let account = state.account_manager.authenticate(&token).await?;

        Ok(AuthUser { account })
    }
}

/// Authenticated account holding the admin role
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub account: Account,
}

#[async_trait]
impl FromRequestParts<AppContext> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser { account } = AuthUser::from_request_parts(parts, state).await?;

        if !account.is_admin() {
            tracing::debug!("Account {} denied admin route", account.id);
            return Err(ApiError::Forbidden(
                "You are not authorized for this route".to_string(),
            ));
        }

        Ok(AdminUser { account })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::{AUTHORIZATION, COOKIE};

    #[test]
    fn test_cookie_preferred_over_header() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, "accessToken=from-cookie; other=1".parse().unwrap());
        headers.insert(AUTHORIZATION, "Bearer from-header".parse().unwrap());

        assert_eq!(extract_access_token(&headers).as_deref(), Some("from-cookie"));
    }

    #[test]
    fn test_falls_back_to_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Bearer from-header".parse().unwrap());

        assert_eq!(extract_access_token(&headers).as_deref(), Some("from-header"));
    }

    #[test]
    fn test_missing_token() {
        assert!(extract_access_token(&HeaderMap::new()).is_none());
    }
}
