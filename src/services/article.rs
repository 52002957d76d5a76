//! Article service
//!
//! Orchestrates article writes on top of the repositories:
//! - creation fills placeholder text, resolves the author list and upserts
//!   nested tags by name, then makes sure the creator is an author
//! - updates are partial; `authors` and `tags`, when given, replace the
//!   whole membership set
//! - updates and deletes are limited to the article's authors
//!
//! Listing and export read through an [`ArticleFilter`] and never check
//! ownership.

use crate::db::repositories::{ArticleRepository, UserRepository};
use crate::models::{
    Article, ArticleFilter, ArticlePayload, CreateArticleInput, ListParams, PagedResult,
    TagPayload, UpdateArticleInput, User, DEFAULT_ABSTRACT, DEFAULT_MAIN_TEXT, DEFAULT_TITLE,
};
use crate::services::export::render_csv;
use crate::services::permissions::{self, AccessDenied, Operation, Target};
use crate::services::tag::{TagService, TagServiceError};
use crate::services::FieldError;
use anyhow::Context;
use std::sync::Arc;

/// Longest accepted title, in characters
pub const MAX_TITLE_LENGTH: usize = 255;

/// Error types for article service operations
#[derive(Debug, thiserror::Error)]
pub enum ArticleServiceError {
    #[error("Authentication required")]
    AuthenticationRequired,

    /// Authenticated, but not one of the article's authors
    #[error("Only an author of the article may modify it")]
    Forbidden,

    #[error("Article not found: {0}")]
    NotFound(i64),

    #[error("Validation error: {0}")]
    ValidationError(FieldError),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<AccessDenied> for ArticleServiceError {
    fn from(denied: AccessDenied) -> Self {
        match denied {
            AccessDenied::AuthenticationRequired => ArticleServiceError::AuthenticationRequired,
            AccessDenied::Forbidden => ArticleServiceError::Forbidden,
        }
    }
}

/// Article service
pub struct ArticleService {
    repo: Arc<dyn ArticleRepository>,
    user_repo: Arc<dyn UserRepository>,
    tags: Arc<TagService>,
}

impl ArticleService {
    pub fn new(
        repo: Arc<dyn ArticleRepository>,
        user_repo: Arc<dyn UserRepository>,
        tags: Arc<TagService>,
    ) -> Self {
        Self {
            repo,
            user_repo,
            tags,
        }
    }

    /// Create an article on behalf of `user`.
    ///
    /// `publication_date` is required; the text fields fall back to
    /// placeholders. The resulting author set is the submitted one plus the
    /// requester.
    pub async fn create(
        &self,
        payload: &ArticlePayload,
        user: Option<&User>,
    ) -> Result<Article, ArticleServiceError> {
        let user = permissions::authorize(user, Operation::Create, Target::New)?;

        let publication_date = payload
            .publication_date
            .ok_or_else(|| ArticleServiceError::ValidationError(FieldError::required("publication_date")))?;
        let title = validate_title(payload.title.as_deref())?.unwrap_or_else(|| DEFAULT_TITLE.to_string());
        let abstract_text = validate_text("abstract", payload.abstract_text.as_deref())?
            .unwrap_or_else(|| DEFAULT_ABSTRACT.to_string());
        let main_text = validate_text("main_text", payload.main_text.as_deref())?
            .unwrap_or_else(|| DEFAULT_MAIN_TEXT.to_string());

        let author_ids = match &payload.authors {
            Some(ids) => self.resolve_authors(ids).await?,
            None => Vec::new(),
        };
        let tag_ids = match &payload.tags {
            Some(tags) => self.resolve_tags(tags).await?,
            None => Vec::new(),
        };

        let input = CreateArticleInput {
            title,
            abstract_text,
            main_text,
            publication_date,
            creator_id: user.id,
            author_ids,
            tag_ids,
        };

        let article = self
            .repo
            .create(&input)
            .await
            .context("Failed to create article")?;

        tracing::info!(
            article_id = article.id,
            user_id = user.id,
            authors = ?article.authors,
            "Article created"
        );
        Ok(article)
    }

    /// Get article by ID
    pub async fn get(&self, id: i64) -> Result<Article, ArticleServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get article")?
            .ok_or(ArticleServiceError::NotFound(id))
    }

    /// List articles matching `filter`, ordered by id
    pub async fn list(
        &self,
        filter: &ArticleFilter,
        params: &ListParams,
    ) -> Result<PagedResult<Article>, ArticleServiceError> {
        let total = self
            .repo
            .count(filter)
            .await
            .context("Failed to count articles")?;
        let items = self
            .repo
            .list(filter, params.offset(), params.limit())
            .await
            .context("Failed to list articles")?;

        Ok(PagedResult::new(items, total, params))
    }

    /// Update an article.
    ///
    /// Only fields present in `payload` change. With `full` set (PUT) the
    /// required fields must be present as on creation.
    pub async fn update(
        &self,
        id: i64,
        payload: &ArticlePayload,
        user: Option<&User>,
        full: bool,
    ) -> Result<Article, ArticleServiceError> {
        permissions::require_user(user)?;
        let article = self.get(id).await?;
        let user = permissions::authorize(user, Operation::Update, Target::Article(&article))?;

        if full && payload.publication_date.is_none() {
            return Err(ArticleServiceError::ValidationError(FieldError::required(
                "publication_date",
            )));
        }

        let author_ids = match &payload.authors {
            Some(ids) => Some(self.resolve_authors(ids).await?),
            None => None,
        };
        let tag_ids = match &payload.tags {
            Some(tags) => Some(self.resolve_tags(tags).await?),
            None => None,
        };

        let input = UpdateArticleInput {
            title: validate_title(payload.title.as_deref())?,
            abstract_text: validate_text("abstract", payload.abstract_text.as_deref())?,
            main_text: validate_text("main_text", payload.main_text.as_deref())?,
            publication_date: payload.publication_date,
            author_ids,
            tag_ids,
        };

        let updated = self
            .repo
            .update(id, &input)
            .await
            .context("Failed to update article")?;

        tracing::info!(article_id = id, user_id = user.id, "Article updated");
        Ok(updated)
    }

    /// Delete an article together with its comments and membership links
    pub async fn delete(&self, id: i64, user: Option<&User>) -> Result<(), ArticleServiceError> {
        permissions::require_user(user)?;
        let article = self.get(id).await?;
        let user = permissions::authorize(user, Operation::Delete, Target::Article(&article))?;

        self.repo
            .delete(id)
            .await
            .context("Failed to delete article")?;

        tracing::info!(article_id = id, user_id = user.id, "Article deleted");
        Ok(())
    }

    /// Render every article matching `filter` as CSV, ordered by id
    pub async fn export_csv(&self, filter: &ArticleFilter) -> Result<String, ArticleServiceError> {
        let rows = self
            .repo
            .export_rows(filter)
            .await
            .context("Failed to load articles for export")?;

        tracing::debug!(rows = rows.len(), "Exporting articles");
        Ok(render_csv(&rows)?)
    }

    // ========================================================================
    // Private helper methods
    // ========================================================================

    /// Check every submitted author id exists. Duplicates collapse, first
    /// occurrence wins.
    async fn resolve_authors(&self, ids: &[i64]) -> Result<Vec<i64>, ArticleServiceError> {
        let mut unique = Vec::with_capacity(ids.len());
        for id in ids {
            if !unique.contains(id) {
                unique.push(*id);
            }
        }
        if unique.is_empty() {
            return Ok(unique);
        }

        let existing = self
            .user_repo
            .existing_ids(&unique)
            .await
            .context("Failed to check authors")?;

        if let Some(missing) = unique.iter().find(|id| existing.binary_search(id).is_err()) {
            return Err(ArticleServiceError::ValidationError(FieldError::new(
                "authors",
                format!("Invalid pk \"{}\" - object does not exist.", missing),
            )));
        }

        Ok(unique)
    }

    /// Upsert nested tags by name, returning their ids in submission order
    async fn resolve_tags(&self, tags: &[TagPayload]) -> Result<Vec<i64>, ArticleServiceError> {
        let mut ids = Vec::with_capacity(tags.len());
        for payload in tags {
            let name = payload.name.as_deref().ok_or_else(|| {
                ArticleServiceError::ValidationError(FieldError::new("tags", "Each tag requires a name."))
            })?;
            let tag = self.tags.create_or_get(name).await.map_err(|e| match e {
                TagServiceError::ValidationError(err) => {
                    ArticleServiceError::ValidationError(FieldError::new("tags", err.message))
                }
                TagServiceError::InternalError(err) => ArticleServiceError::InternalError(err),
                other => ArticleServiceError::InternalError(anyhow::anyhow!(other.to_string())),
            })?;
            if !ids.contains(&tag.id) {
                ids.push(tag.id);
            }
        }
        Ok(ids)
    }
}

fn validate_title(title: Option<&str>) -> Result<Option<String>, ArticleServiceError> {
    let Some(title) = title.map(str::trim) else {
        return Ok(None);
    };
    if title.is_empty() {
        return Err(ArticleServiceError::ValidationError(FieldError::blank("title")));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(ArticleServiceError::ValidationError(FieldError::new(
            "title",
            format!("Ensure this field has no more than {} characters.", MAX_TITLE_LENGTH),
        )));
    }
    Ok(Some(title.to_string()))
}

// Body text keeps its whitespace; it only has to contain something.
fn validate_text(field: &str, text: Option<&str>) -> Result<Option<String>, ArticleServiceError> {
    match text {
        Some(text) if text.trim().is_empty() => {
            Err(ArticleServiceError::ValidationError(FieldError::blank(field)))
        }
        Some(text) => Ok(Some(text.to_string())),
        None => Ok(None),
    }
}
