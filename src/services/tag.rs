//! Tag service
//!
//! Tags are unowned: any authenticated user may create, rename or delete
//! any tag. Names are trimmed and must be unique; articles reach tags through
//! [`TagService::create_or_get`], which reuses an existing tag of the same
//! name instead of failing on the uniqueness constraint.

use crate::db::repositories::{is_unique_violation, TagRepository};
use crate::models::{ListParams, PagedResult, Tag, TagPayload, User};
use crate::services::permissions::{self, AccessDenied, Operation, Target};
use crate::services::FieldError;
use anyhow::Context;
use std::sync::Arc;

/// Longest accepted tag name, in characters
pub const MAX_TAG_NAME_LENGTH: usize = 255;

/// Error types for tag service operations
#[derive(Debug, thiserror::Error)]
pub enum TagServiceError {
    /// No identity presented for a write
    #[error("Authentication required")]
    AuthenticationRequired,

    /// Tag not found
    #[error("Tag not found: {0}")]
    NotFound(i64),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(FieldError),

    /// Another tag already has this name
    #[error("Tag name already exists: {0}")]
    ConstraintViolation(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<AccessDenied> for TagServiceError {
    fn from(_: AccessDenied) -> Self {
        // Tags have no owner, so the only possible refusal is a missing identity.
        TagServiceError::AuthenticationRequired
    }
}

/// Tag service
pub struct TagService {
    repo: Arc<dyn TagRepository>,
}

impl TagService {
    pub fn new(repo: Arc<dyn TagRepository>) -> Self {
        Self { repo }
    }

    /// Create a tag explicitly.
    ///
    /// # Errors
    /// - `AuthenticationRequired` for anonymous callers
    /// - `ValidationError` on `name` if it is missing, blank or too long
    /// - `ConstraintViolation` if the name is taken
    pub async fn create(
        &self,
        payload: &TagPayload,
        user: Option<&User>,
    ) -> Result<Tag, TagServiceError> {
        let user = permissions::authorize(user, Operation::Create, Target::New)?;
        let name = validate_name(payload.name.as_deref())?;

        let tag = self.repo.create(&name).await.map_err(|e| {
            if is_unique_violation(&e) {
                TagServiceError::ConstraintViolation(name.clone())
            } else {
                TagServiceError::InternalError(e.context("Failed to create tag"))
            }
        })?;

        tracing::info!(tag_id = tag.id, user_id = user.id, name = %tag.name, "Tag created");
        Ok(tag)
    }

    /// Look a tag up by name, creating it on a miss.
    ///
    /// Two writers may both miss and race on the insert; the loser re-reads
    /// the winner's row.
    pub async fn create_or_get(&self, name: &str) -> Result<Tag, TagServiceError> {
        let name = validate_name(Some(name))?;

        if let Some(existing) = self
            .repo
            .get_by_name(&name)
            .await
            .context("Failed to look up tag by name")?
        {
            return Ok(existing);
        }

        match self.repo.create(&name).await {
            Ok(tag) => {
                tracing::info!(tag_id = tag.id, name = %tag.name, "Tag created on first use");
                Ok(tag)
            }
            Err(e) if is_unique_violation(&e) => self
                .repo
                .get_by_name(&name)
                .await
                .context("Failed to re-read tag after concurrent insert")?
                .ok_or_else(|| {
                    TagServiceError::InternalError(anyhow::anyhow!(
                        "Tag '{}' vanished after a unique violation",
                        name
                    ))
                }),
            Err(e) => Err(TagServiceError::InternalError(
                e.context("Failed to create tag"),
            )),
        }
    }

    /// Get tag by ID
    pub async fn get(&self, id: i64) -> Result<Tag, TagServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get tag by ID")?
            .ok_or(TagServiceError::NotFound(id))
    }

    /// List tags ordered by id
    pub async fn list(&self, params: &ListParams) -> Result<PagedResult<Tag>, TagServiceError> {
        let total = self.repo.count().await.context("Failed to count tags")?;
        let items = self
            .repo
            .list(params.offset(), params.limit())
            .await
            .context("Failed to list tags")?;

        Ok(PagedResult::new(items, total, params))
    }

    /// Rename a tag.
    ///
    /// With `full` set (PUT) the name is required; otherwise a payload
    /// without a name leaves the tag as it is.
    pub async fn update(
        &self,
        id: i64,
        payload: &TagPayload,
        user: Option<&User>,
        full: bool,
    ) -> Result<Tag, TagServiceError> {
        permissions::require_user(user)?;
        let tag = self.get(id).await?;
        let user = permissions::authorize(user, Operation::Update, Target::Tag(&tag))?;

        if payload.name.is_none() && !full {
            return Ok(tag);
        }
        let name = validate_name(payload.name.as_deref())?;

        let updated = self.repo.update(id, &name).await.map_err(|e| {
            if is_unique_violation(&e) {
                TagServiceError::ConstraintViolation(name.clone())
            } else {
                TagServiceError::InternalError(e.context("Failed to update tag"))
            }
        })?;

        tracing::info!(tag_id = id, user_id = user.id, name = %updated.name, "Tag updated");
        Ok(updated)
    }

    /// Delete a tag. Articles lose the link but are otherwise untouched.
    pub async fn delete(&self, id: i64, user: Option<&User>) -> Result<(), TagServiceError> {
        permissions::require_user(user)?;
        let tag = self.get(id).await?;
        let user = permissions::authorize(user, Operation::Delete, Target::Tag(&tag))?;

        self.repo.delete(id).await.context("Failed to delete tag")?;

        tracing::info!(tag_id = id, user_id = user.id, "Tag deleted");
        Ok(())
    }
}

/// Trim a submitted tag name and check it is present, non-blank and short enough.
pub fn validate_name(name: Option<&str>) -> Result<String, TagServiceError> {
    let name = name
        .map(str::trim)
        .ok_or_else(|| TagServiceError::ValidationError(FieldError::required("name")))?;

    if name.is_empty() {
        return Err(TagServiceError::ValidationError(FieldError::blank("name")));
    }
    if name.chars().count() > MAX_TAG_NAME_LENGTH {
        return Err(TagServiceError::ValidationError(FieldError::new(
            "name",
            format!("Ensure this field has no more than {} characters.", MAX_TAG_NAME_LENGTH),
        )));
    }

    Ok(name.to_string())
}
