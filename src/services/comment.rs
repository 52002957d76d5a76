//! Comment service
//!
//! Comments belong to exactly one user, the one who posted them. The author
//! is taken from the request identity and cannot be chosen or changed by the
//! client; only that author may edit or delete the comment.

use crate::db::repositories::{ArticleRepository, CommentRepository};
use crate::models::{
    Comment, CommentPayload, CreateCommentInput, ListParams, PagedResult, UpdateCommentInput, User,
};
use crate::services::permissions::{self, AccessDenied, Operation, Target};
use crate::services::FieldError;
use anyhow::Context;
use std::sync::Arc;

/// Error types for comment service operations
#[derive(Debug, thiserror::Error)]
pub enum CommentServiceError {
    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("Only the author of the comment may modify it")]
    Forbidden,

    #[error("Comment not found: {0}")]
    NotFound(i64),

    #[error("Validation error: {0}")]
    ValidationError(FieldError),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<AccessDenied> for CommentServiceError {
    fn from(denied: AccessDenied) -> Self {
        match denied {
            AccessDenied::AuthenticationRequired => CommentServiceError::AuthenticationRequired,
            AccessDenied::Forbidden => CommentServiceError::Forbidden,
        }
    }
}

/// Comment service
pub struct CommentService {
    repo: Arc<dyn CommentRepository>,
    article_repo: Arc<dyn ArticleRepository>,
}

impl CommentService {
    pub fn new(repo: Arc<dyn CommentRepository>, article_repo: Arc<dyn ArticleRepository>) -> Self {
        Self { repo, article_repo }
    }

    /// Post a comment as `user`, optionally attached to an article
    pub async fn create(
        &self,
        payload: &CommentPayload,
        user: Option<&User>,
    ) -> Result<Comment, CommentServiceError> {
        let user = permissions::authorize(user, Operation::Create, Target::New)?;

        let content = validate_content(payload.content.as_deref())?
            .ok_or_else(|| CommentServiceError::ValidationError(FieldError::required("content")))?;
        let article_id = payload.article.flatten();
        if let Some(article_id) = article_id {
            self.ensure_article(article_id).await?;
        }

        let comment = self
            .repo
            .create(&CreateCommentInput {
                author_id: user.id,
                content,
                article_id,
            })
            .await
            .context("Failed to create comment")?;

        tracing::info!(
            comment_id = comment.id,
            user_id = user.id,
            article_id = ?comment.article,
            "Comment created"
        );
        Ok(comment)
    }

    /// Get comment by ID
    pub async fn get(&self, id: i64) -> Result<Comment, CommentServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get comment")?
            .ok_or(CommentServiceError::NotFound(id))
    }

    /// List comments ordered by id, optionally only those of one article
    pub async fn list(
        &self,
        article_id: Option<i64>,
        params: &ListParams,
    ) -> Result<PagedResult<Comment>, CommentServiceError> {
        let total = self
            .repo
            .count(article_id)
            .await
            .context("Failed to count comments")?;
        let items = self
            .repo
            .list(article_id, params.offset(), params.limit())
            .await
            .context("Failed to list comments")?;

        Ok(PagedResult::new(items, total, params))
    }

    /// Update a comment's content or article.
    ///
    /// With `full` set (PUT) `content` is required.
    pub async fn update(
        &self,
        id: i64,
        payload: &CommentPayload,
        user: Option<&User>,
        full: bool,
    ) -> Result<Comment, CommentServiceError> {
        permissions::require_user(user)?;
        let comment = self.get(id).await?;
        let user = permissions::authorize(user, Operation::Update, Target::Comment(&comment))?;

        let content = validate_content(payload.content.as_deref())?;
        if full && content.is_none() {
            return Err(CommentServiceError::ValidationError(FieldError::required("content")));
        }
        if let Some(Some(article_id)) = payload.article {
            self.ensure_article(article_id).await?;
        }

        let input = UpdateCommentInput {
            content,
            article_id: payload.article,
        };
        if input.content.is_none() && input.article_id.is_none() {
            return Ok(comment);
        }

        let updated = self
            .repo
            .update(id, &input)
            .await
            .context("Failed to update comment")?;

        tracing::info!(comment_id = id, user_id = user.id, "Comment updated");
        Ok(updated)
    }

    /// Delete a comment. The article it is attached to is unaffected.
    pub async fn delete(&self, id: i64, user: Option<&User>) -> Result<(), CommentServiceError> {
        permissions::require_user(user)?;
        let comment = self.get(id).await?;
        let user = permissions::authorize(user, Operation::Delete, Target::Comment(&comment))?;

        self.repo
            .delete(id)
            .await
            .context("Failed to delete comment")?;

        tracing::info!(comment_id = id, user_id = user.id, "Comment deleted");
        Ok(())
    }

    async fn ensure_article(&self, article_id: i64) -> Result<(), CommentServiceError> {
        let exists = self
            .article_repo
            .exists(article_id)
            .await
            .context("Failed to check article")?;

        if exists {
            Ok(())
        } else {
            Err(CommentServiceError::ValidationError(FieldError::new(
                "article",
                format!("Invalid pk \"{}\" - object does not exist.", article_id),
            )))
        }
    }
}

fn validate_content(content: Option<&str>) -> Result<Option<String>, CommentServiceError> {
    match content {
        Some(text) if text.trim().is_empty() => {
            Err(CommentServiceError::ValidationError(FieldError::blank("content")))
        }
        Some(text) => Ok(Some(text.to_string())),
        None => Ok(None),
    }
}
