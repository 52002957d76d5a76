//! Data models
//!
//! Entities stored by Pressroom (users, sessions, tags, articles, comments),
//! the payloads clients submit for them, and the resolved inputs handed to
//! the repositories.

mod article;
mod comment;
mod pagination;
mod session;
mod tag;
mod user;

pub use article::{
    Article, ArticleExportRow, ArticleFilter, ArticlePayload, CreateArticleInput,
    UpdateArticleInput, DEFAULT_ABSTRACT, DEFAULT_MAIN_TEXT, DEFAULT_TITLE,
};
pub use comment::{Comment, CommentPayload, CreateCommentInput, UpdateCommentInput};
pub use pagination::{ListParams, PagedResult};
pub use session::Session;
pub use tag::{Tag, TagPayload};
pub use user::{CreateUserInput, User};
