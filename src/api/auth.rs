//! Authentication API endpoints
//!
//! - POST /api/v1/auth/register - User registration
//! - POST /api/v1/auth/login    - User login (username or email)
//! - POST /api/v1/auth/logout   - User logout
//! - GET  /api/v1/auth/me       - Get current user

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{CreateUserInput, User};
use crate::services::{LoginInput, UserServiceError};

/// Response for user info
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
        }
    }
}

/// Response for successful login
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserResponse,
}

impl From<UserServiceError> for ApiError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::AuthenticationError(msg) => ApiError::unauthorized(msg),
            UserServiceError::ValidationError(field) => ApiError::field(field),
            UserServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

/// Build public auth routes (no auth required)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

/// Build protected auth routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(get_current_user))
}

/// POST /api/v1/auth/register
async fn register(
    State(state): State<AppState>,
    body: Result<Json<CreateUserInput>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body?;
    let user = state.user_service.register(&body).await?;
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// POST /api/v1/auth/login
///
/// Returns the token in the body and also sets it as an HttpOnly `session`
/// cookie.
async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginInput>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body?;
    let outcome = state.user_service.login(&body).await?;

    let cookie = format!(
        "session={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        outcome.session.id,
        state.config.auth.session_days.max(0) * 24 * 60 * 60
    );
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&cookie)
            .map_err(|e| ApiError::internal(anyhow::anyhow!("Invalid cookie header: {}", e)))?,
    );

    Ok((
        headers,
        Json(LoginResponse {
            token: outcome.session.id,
            expires_at: outcome.session.expires_at,
            user: outcome.user.into(),
        }),
    ))
}

/// POST /api/v1/auth/logout
async fn logout(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    state.user_service.logout(&auth.token).await?;
    tracing::info!(user_id = auth.user.id, "User logged out");

    Ok((
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, "session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")],
    ))
}

/// GET /api/v1/auth/me
async fn get_current_user(auth: AuthenticatedUser) -> Json<UserResponse> {
    Json(auth.user.into())
}
