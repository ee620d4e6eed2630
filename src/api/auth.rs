use axum::{
    Extension,
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use serde::Deserialize;
use std::sync::Arc;

use super::validation::{validate_email, validate_password, validate_username};
use super::{ApiError, ApiResponse, AppJson, AppState, CallerDto};
use crate::domain::Caller;
use crate::services::{AuthError, LoginResult, SignupInput, UserInfo};

// ============================================================================
// Request Types
// ============================================================================

#[derive(Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub password: String,
    pub email: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

// ============================================================================
// Middleware
// ============================================================================

/// Resolves the bearer token to a [`Caller`] and stores it as a request extension.
///
/// Accepted sources:
/// 1. `Authorization: Bearer <token>` header
/// 2. `X-Api-Key` header
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(&headers)
        .ok_or_else(|| ApiError::unauthorized("Not authenticated"))?;

    let caller = match state.auth_service().resolve_caller(&token).await {
        Ok(caller) => caller,
        Err(AuthError::Unauthorized) => {
            return Err(ApiError::unauthorized("Invalid or expired token"));
        }
        Err(e) => return Err(e.into()),
    };

    tracing::Span::current().record("user_id", caller.user_id.value());
    request.extensions_mut().insert(caller);

    Ok(next.run(request).await)
}

/// Extract the token from the request headers
fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get("Authorization")
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
    {
        let token = token.trim();
        if !token.is_empty() {
            return Some(token.to_string());
        }
    }

    if let Some(api_key) = headers.get("X-Api-Key")
        && let Ok(key_str) = api_key.to_str()
        && !key_str.trim().is_empty()
    {
        return Some(key_str.trim().to_string());
    }

    None
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/signup
pub async fn signup(
    State(state): State<Arc<AppState>>,
    AppJson(payload): AppJson<SignupRequest>,
) -> Result<ApiResponse<UserInfo>, ApiError> {
    let username = validate_username(payload.username.trim())?.to_string();
    let email = validate_email(&payload.email)?.to_string();
    validate_password(&payload.password)?;

    let user = state
        .auth_service()
        .signup(SignupInput {
            username,
            password: payload.password,
            email,
        })
        .await?;

    Ok(ApiResponse::created("User registered successfully", user))
}

/// POST /auth/login
/// Authenticate with username and password, returns a fresh token pair
pub async fn login(
    State(state): State<Arc<AppState>>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<ApiResponse<LoginResult>, ApiError> {
    if payload.username.is_empty() {
        return Err(ApiError::validation("Username is required"));
    }
    if payload.password.is_empty() {
        return Err(ApiError::validation("Password is required"));
    }

    let result = state
        .auth_service()
        .login(&payload.username, &payload.password)
        .await?;

    Ok(ApiResponse::success("Login successful", result))
}

/// POST /auth/logout
/// Revokes every token of the caller
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> Result<ApiResponse<()>, ApiError> {
    state.auth_service().logout(&caller).await?;
    Ok(ApiResponse::message("Logged out successfully"))
}

/// GET /auth/me
pub async fn get_current_user(Extension(caller): Extension<Caller>) -> ApiResponse<CallerDto> {
    ApiResponse::success(
        "Current user retrieved successfully",
        CallerDto {
            user_id: caller.user_id.value(),
            username: caller.username,
            is_admin: caller.is_admin,
            is_staff: caller.is_staff,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_header_wins_over_api_key() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", HeaderValue::from_static("Bearer abc"));
        headers.insert("X-Api-Key", HeaderValue::from_static("def"));
        assert_eq!(extract_token(&headers).as_deref(), Some("abc"));
    }

    #[test]
    fn api_key_header_is_accepted() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Api-Key", HeaderValue::from_static("def"));
        assert_eq!(extract_token(&headers).as_deref(), Some("def"));
    }

    #[test]
    fn missing_or_malformed_headers_yield_nothing() {
        assert_eq!(extract_token(&HeaderMap::new()), None);

        let mut headers = HeaderMap::new();
        headers.insert("Authorization", HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_token(&headers), None);

        let mut headers = HeaderMap::new();
        headers.insert("Authorization", HeaderValue::from_static("Bearer   "));
        assert_eq!(extract_token(&headers), None);
    }
}
