//! Services layer - Business logic
//!
//! Services sit between the HTTP handlers and the repositories. They are
//! responsible for:
//! - Access control (who may mutate what)
//! - Validation and defaults
//! - Orchestrating multi-repository writes (tag upsert, author attachment)

pub mod article;
pub mod comment;
pub mod export;
pub mod password;
pub mod permissions;
pub mod tag;
pub mod user;

use std::fmt;

pub use article::{ArticleService, ArticleServiceError};
pub use comment::{CommentService, CommentServiceError};
pub use export::{render_csv, CSV_HEADER};
pub use password::{hash_password, verify_password};
pub use permissions::{authorize, can_edit_article, can_edit_comment, AccessDenied, Operation, Target};
pub use tag::{TagService, TagServiceError};
pub use user::{LoginInput, LoginOutcome, UserService, UserServiceError};

/// A validation failure attributed to one input field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn required(field: &str) -> Self {
        Self::new(field, "This field is required.")
    }

    pub fn blank(field: &str) -> Self {
        Self::new(field, "This field may not be blank.")
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}
