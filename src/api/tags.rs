//! Tag API endpoints
//!
//! Reads are public; writes need any authenticated user.
//! - GET/POST /api/v1/tags
//! - GET/PUT/PATCH/DELETE /api/v1/tags/{id}

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

use crate::api::common::{list_params, ListResponse};
use crate::api::middleware::{ApiError, AppState, MaybeUser, ResourceId};
use crate::models::{Tag, TagPayload};
use crate::services::{FieldError, TagServiceError};

/// Query parameters for tag list
#[derive(Debug, Deserialize)]
pub struct TagListQuery {
    pub page: Option<String>,
    pub page_size: Option<String>,
}

impl From<TagServiceError> for ApiError {
    fn from(err: TagServiceError) -> Self {
        match err {
            TagServiceError::AuthenticationRequired => {
                ApiError::unauthorized("Authentication credentials were not provided")
            }
            TagServiceError::NotFound(id) => ApiError::not_found(format!("Tag {} not found", id)),
            TagServiceError::ValidationError(field) => ApiError::field(field),
            TagServiceError::ConstraintViolation(_) => {
                ApiError::field(FieldError::new("name", "tag with this name already exists."))
            }
            TagServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

/// Build the tags router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tags).post(create_tag))
        .route(
            "/{id}",
            get(get_tag).put(put_tag).patch(patch_tag).delete(delete_tag),
        )
}

/// GET /api/v1/tags
async fn list_tags(
    State(state): State<AppState>,
    query: Result<Query<TagListQuery>, QueryRejection>,
) -> Result<Json<ListResponse<Tag>>, ApiError> {
    let Query(query) = query?;
    let params = list_params(
        query.page.as_deref(),
        query.page_size.as_deref(),
        &state.config.pagination,
    )?;

    let page = state.tag_service.list(&params).await?;
    Ok(Json(page.into()))
}

/// POST /api/v1/tags
async fn create_tag(
    State(state): State<AppState>,
    user: MaybeUser,
    payload: Result<Json<TagPayload>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    if user.user().is_none() {
        return Err(TagServiceError::AuthenticationRequired.into());
    }
    let Json(payload) = payload?;

    let tag = state.tag_service.create(&payload, user.user()).await?;
    Ok((StatusCode::CREATED, Json(tag)))
}

/// GET /api/v1/tags/{id}
async fn get_tag(
    State(state): State<AppState>,
    ResourceId(id): ResourceId,
) -> Result<Json<Tag>, ApiError> {
    Ok(Json(state.tag_service.get(id).await?))
}

/// PUT /api/v1/tags/{id}
async fn put_tag(
    State(state): State<AppState>,
    ResourceId(id): ResourceId,
    user: MaybeUser,
    payload: Result<Json<TagPayload>, JsonRejection>,
) -> Result<Json<Tag>, ApiError> {
    update_tag(state, id, user, payload, true).await
}

/// PATCH /api/v1/tags/{id}
async fn patch_tag(
    State(state): State<AppState>,
    ResourceId(id): ResourceId,
    user: MaybeUser,
    payload: Result<Json<TagPayload>, JsonRejection>,
) -> Result<Json<Tag>, ApiError> {
    update_tag(state, id, user, payload, false).await
}

async fn update_tag(
    state: AppState,
    id: i64,
    user: MaybeUser,
    payload: Result<Json<TagPayload>, JsonRejection>,
    full: bool,
) -> Result<Json<Tag>, ApiError> {
    if user.user().is_none() {
        return Err(TagServiceError::AuthenticationRequired.into());
    }
    let Json(payload) = payload?;

    let tag = state.tag_service.update(id, &payload, user.user(), full).await?;
    Ok(Json(tag))
}

/// DELETE /api/v1/tags/{id}
async fn delete_tag(
    State(state): State<AppState>,
    ResourceId(id): ResourceId,
    user: MaybeUser,
) -> Result<StatusCode, ApiError> {
    state.tag_service.delete(id, user.user()).await?;
    Ok(StatusCode::NO_CONTENT)
}
