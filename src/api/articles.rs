//! Article API endpoints
//!
//! - GET    /api/v1/articles           list (filters + search)
//! - POST   /api/v1/articles           create
//! - GET    /api/v1/articles/download  CSV export (same filters, plus `id`)
//! - GET    /api/v1/articles/{id}      retrieve
//! - PUT    /api/v1/articles/{id}      full update
//! - PATCH  /api/v1/articles/{id}      partial update
//! - DELETE /api/v1/articles/{id}      delete

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::api::common::{list_params, parse_param, ListResponse};
use crate::api::middleware::{ApiError, AppState, MaybeUser, ResourceId};
use crate::models::{Article, ArticleFilter, ArticlePayload};
use crate::services::ArticleServiceError;

/// Query parameters accepted by the list and download endpoints
#[derive(Debug, Default, Deserialize)]
pub struct ArticleQuery {
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub id: Option<String>,
    pub publication_date: Option<String>,
    pub authors: Option<String>,
    pub tags: Option<String>,
    pub search: Option<String>,
}

impl ArticleQuery {
    /// Typed filter from the recognised parameters. `id` only applies to the
    /// export.
    pub fn filter(&self, with_id: bool) -> Result<ArticleFilter, ApiError> {
        let id = if with_id {
            parse_param::<i64>("id", self.id.as_deref())?
        } else {
            None
        };

        Ok(ArticleFilter {
            id,
            publication_date: parse_param::<NaiveDate>("publication_date", self.publication_date.as_deref())?,
            author: parse_param::<i64>("authors", self.authors.as_deref())?,
            tag: parse_param::<i64>("tags", self.tags.as_deref())?,
            search: self
                .search
                .as_deref()
                .map(str::trim)
                .filter(|term| !term.is_empty())
                .map(str::to_string),
        })
    }
}

impl From<ArticleServiceError> for ApiError {
    fn from(err: ArticleServiceError) -> Self {
        match err {
            ArticleServiceError::AuthenticationRequired => {
                ApiError::unauthorized("Authentication credentials were not provided")
            }
            ArticleServiceError::Forbidden => {
                ApiError::forbidden("Only an author of the article may modify it")
            }
            ArticleServiceError::NotFound(id) => ApiError::not_found(format!("Article {} not found", id)),
            ArticleServiceError::ValidationError(field) => ApiError::field(field),
            ArticleServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

/// Build the articles router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_articles).post(create_article))
        .route("/download", get(download_articles))
        .route(
            "/{id}",
            get(get_article)
                .put(put_article)
                .patch(patch_article)
                .delete(delete_article),
        )
}

/// GET /api/v1/articles
async fn list_articles(
    State(state): State<AppState>,
    query: Result<Query<ArticleQuery>, QueryRejection>,
) -> Result<Json<ListResponse<Article>>, ApiError> {
    let Query(query) = query?;
    let filter = query.filter(false)?;
    let params = list_params(
        query.page.as_deref(),
        query.page_size.as_deref(),
        &state.config.pagination,
    )?;

    let page = state.article_service.list(&filter, &params).await?;
    Ok(Json(page.into()))
}

/// POST /api/v1/articles
async fn create_article(
    State(state): State<AppState>,
    user: MaybeUser,
    payload: Result<Json<ArticlePayload>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    // Identity is checked before the body so an anonymous request reports 401
    // even when its body is malformed.
    if user.user().is_none() {
        return Err(ArticleServiceError::AuthenticationRequired.into());
    }
    let Json(payload) = payload?;

    let article = state.article_service.create(&payload, user.user()).await?;
    Ok((StatusCode::CREATED, Json(article)))
}

/// GET /api/v1/articles/{id}
async fn get_article(
    State(state): State<AppState>,
    ResourceId(id): ResourceId,
) -> Result<Json<Article>, ApiError> {
    Ok(Json(state.article_service.get(id).await?))
}

/// PUT /api/v1/articles/{id}
async fn put_article(
    State(state): State<AppState>,
    ResourceId(id): ResourceId,
    user: MaybeUser,
    payload: Result<Json<ArticlePayload>, JsonRejection>,
) -> Result<Json<Article>, ApiError> {
    update_article(state, id, user, payload, true).await
}

/// PATCH /api/v1/articles/{id}
async fn patch_article(
    State(state): State<AppState>,
    ResourceId(id): ResourceId,
    user: MaybeUser,
    payload: Result<Json<ArticlePayload>, JsonRejection>,
) -> Result<Json<Article>, ApiError> {
    update_article(state, id, user, payload, false).await
}

async fn update_article(
    state: AppState,
    id: i64,
    user: MaybeUser,
    payload: Result<Json<ArticlePayload>, JsonRejection>,
    full: bool,
) -> Result<Json<Article>, ApiError> {
    if user.user().is_none() {
        return Err(ArticleServiceError::AuthenticationRequired.into());
    }
    let Json(payload) = payload?;

    let article = state
        .article_service
        .update(id, &payload, user.user(), full)
        .await?;
    Ok(Json(article))
}

/// DELETE /api/v1/articles/{id}
async fn delete_article(
    State(state): State<AppState>,
    ResourceId(id): ResourceId,
    user: MaybeUser,
) -> Result<StatusCode, ApiError> {
    state.article_service.delete(id, user.user()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/articles/download
async fn download_articles(
    State(state): State<AppState>,
    query: Result<Query<ArticleQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    let filter = query.filter(true)?;

    let body = state.article_service.export_csv(&filter).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"articles.csv\""),
        ],
        body,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_from_query() {
        let query = ArticleQuery {
            id: Some("5".to_string()),
            publication_date: Some("2025-01-01".to_string()),
            authors: Some("2".to_string()),
            search: Some("  rust ".to_string()),
            ..Default::default()
        };

        let filter = query.filter(false).unwrap();
        assert_eq!(filter.id, None);
        assert_eq!(filter.publication_date, NaiveDate::from_ymd_opt(2025, 1, 1));
        assert_eq!(filter.author, Some(2));
        assert_eq!(filter.tag, None);
        assert_eq!(filter.search.as_deref(), Some("rust"));

        assert_eq!(query.filter(true).unwrap().id, Some(5));
    }

    #[test]
    fn test_filter_rejects_bad_values() {
        let query = ArticleQuery {
            tags: Some("rust".to_string()),
            ..Default::default()
        };
        let err = query.filter(false).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.error.details.unwrap().get("tags").is_some());
    }

    #[test]
    fn test_blank_search_is_ignored() {
        let query = ArticleQuery {
            search: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(query.filter(false).unwrap().is_empty());
    }
}
