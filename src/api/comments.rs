//! Comment API endpoints
//!
//! - GET  /api/v1/comments            list, optionally `?article=<id>`
//! - POST /api/v1/comments            create as the requester
//! - GET/PUT/PATCH/DELETE /api/v1/comments/{id}
//!
//! Only the comment's author may modify it.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::{list_params, parse_param, ListResponse};
use crate::api::middleware::{ApiError, AppState, MaybeUser, ResourceId};
use crate::models::{Comment, CommentPayload};
use crate::services::CommentServiceError;

/// Query parameters for comment list
#[derive(Debug, Deserialize)]
pub struct CommentListQuery {
    pub page: Option<String>,
    pub page_size: Option<String>,
    /// Only comments attached to this article
    pub article: Option<String>,
}

impl From<CommentServiceError> for ApiError {
    fn from(err: CommentServiceError) -> Self {
        match err {
            CommentServiceError::AuthenticationRequired => {
                ApiError::unauthorized("Authentication credentials were not provided")
            }
            CommentServiceError::Forbidden => {
                ApiError::forbidden("Only the author of the comment may modify it")
            }
            CommentServiceError::NotFound(id) => {
                ApiError::not_found(format!("Comment {} not found", id))
            }
            CommentServiceError::ValidationError(field) => ApiError::field(field),
            CommentServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

/// Build the comments router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_comments).post(create_comment))
        .route(
            "/{id}",
            get(get_comment)
                .put(put_comment)
                .patch(patch_comment)
                .delete(delete_comment),
        )
}

/// GET /api/v1/comments
async fn list_comments(
    State(state): State<AppState>,
    query: Result<Query<CommentListQuery>, QueryRejection>,
) -> Result<Json<ListResponse<Comment>>, ApiError> {
    let Query(query) = query?;
    let article = parse_param::<i64>("article", query.article.as_deref())?;
    let params = list_params(
        query.page.as_deref(),
        query.page_size.as_deref(),
        &state.config.pagination,
    )?;

    let page = state.comment_service.list(article, &params).await?;
    Ok(Json(page.into()))
}

/// POST /api/v1/comments
async fn create_comment(
    State(state): State<AppState>,
    user: MaybeUser,
    payload: Result<Json<CommentPayload>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    if user.user().is_none() {
        return Err(CommentServiceError::AuthenticationRequired.into());
    }
    let Json(payload) = payload?;

    let comment = state.comment_service.create(&payload, user.user()).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// GET /api/v1/comments/{id}
async fn get_comment(
    State(state): State<AppState>,
    ResourceId(id): ResourceId,
) -> Result<Json<Comment>, ApiError> {
    Ok(Json(state.comment_service.get(id).await?))
}

/// PUT /api/v1/comments/{id}
async fn put_comment(
    State(state): State<AppState>,
    ResourceId(id): ResourceId,
    user: MaybeUser,
    payload: Result<Json<CommentPayload>, JsonRejection>,
) -> Result<Json<Comment>, ApiError> {
    update_comment(state, id, user, payload, true).await
}

/// PATCH /api/v1/comments/{id}
async fn patch_comment(
    State(state): State<AppState>,
    ResourceId(id): ResourceId,
    user: MaybeUser,
    payload: Result<Json<CommentPayload>, JsonRejection>,
) -> Result<Json<Comment>, ApiError> {
    update_comment(state, id, user, payload, false).await
}

async fn update_comment(
    state: AppState,
    id: i64,
    user: MaybeUser,
    payload: Result<Json<CommentPayload>, JsonRejection>,
    full: bool,
) -> Result<Json<Comment>, ApiError> {
    if user.user().is_none() {
        return Err(CommentServiceError::AuthenticationRequired.into());
    }
    let Json(payload) = payload?;

    let comment = state
        .comment_service
        .update(id, &payload, user.user(), full)
        .await?;
    Ok(Json(comment))
}

/// DELETE /api/v1/comments/{id}
async fn delete_comment(
    State(state): State<AppState>,
    ResourceId(id): ResourceId,
    user: MaybeUser,
) -> Result<StatusCode, ApiError> {
    state.comment_service.delete(id, user.user()).await?;
    Ok(StatusCode::NO_CONTENT)
}
