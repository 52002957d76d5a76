//! Article model
//!
//! An article is collectively owned by its author set. `authors` holds user
//! ids and `tags` the full tag records, both in the order the links were
//! written.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::TagPayload;

/// Placeholder title for articles created without one
pub const DEFAULT_TITLE: &str = "Title to be added";
/// Placeholder abstract for articles created without one
pub const DEFAULT_ABSTRACT: &str = "Abstract to be added";
/// Placeholder body for articles created without one
pub const DEFAULT_MAIN_TEXT: &str = "Full text to be added";

/// Article entity
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Article {
    pub id: i64,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub publication_date: NaiveDate,
    pub main_text: String,
    /// Author user ids
    pub authors: Vec<i64>,
    pub tags: Vec<super::Tag>,
    #[serde(skip_serializing)]
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub updated_at: DateTime<Utc>,
}

impl Article {
    /// Check whether the given user is among the authors
    pub fn has_author(&self, user_id: i64) -> bool {
        self.authors.contains(&user_id)
    }
}

/// Article body as submitted by clients.
///
/// Every field is optional at this level; which ones are required depends on
/// the operation (create, full update, partial update).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArticlePayload {
    pub title: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub main_text: Option<String>,
    pub publication_date: Option<NaiveDate>,
    /// Replacement author set (user ids)
    pub authors: Option<Vec<i64>>,
    /// Replacement tag set, upserted by name
    pub tags: Option<Vec<TagPayload>>,
}

/// Resolved input for inserting an article.
///
/// The author set is written from `author_ids` and `creator_id` is then added
/// to it if absent.
#[derive(Debug, Clone)]
pub struct CreateArticleInput {
    pub title: String,
    pub abstract_text: String,
    pub main_text: String,
    pub publication_date: NaiveDate,
    pub creator_id: i64,
    pub author_ids: Vec<i64>,
    pub tag_ids: Vec<i64>,
}

/// Resolved input for updating an article.
///
/// `None` leaves the column or membership set untouched; `Some` on
/// `author_ids`/`tag_ids` replaces the whole set.
#[derive(Debug, Clone, Default)]
pub struct UpdateArticleInput {
    pub title: Option<String>,
    pub abstract_text: Option<String>,
    pub main_text: Option<String>,
    pub publication_date: Option<NaiveDate>,
    pub author_ids: Option<Vec<i64>>,
    pub tag_ids: Option<Vec<i64>>,
}

/// Conjunction of article predicates. Unset fields do not restrict.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArticleFilter {
    /// Exact article id (export only)
    pub id: Option<i64>,
    /// Exact publication date
    pub publication_date: Option<NaiveDate>,
    /// Articles this user is an author of
    pub author: Option<i64>,
    /// Articles carrying this tag
    pub tag: Option<i64>,
    /// Case-insensitive substring of title, abstract or main text
    pub search: Option<String>,
}

impl ArticleFilter {
    pub fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.publication_date.is_none()
            && self.author.is_none()
            && self.tag.is_none()
            && self.search.is_none()
    }
}

/// One line of the CSV export: an article with its authors and tags
/// rendered by name.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleExportRow {
    pub id: i64,
    pub title: String,
    pub abstract_text: String,
    pub publication_date: NaiveDate,
    pub authors: Vec<String>,
    pub tags: Vec<String>,
}
