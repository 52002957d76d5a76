//! Comment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Comment entity.
///
/// `author` is assigned from the requester at creation and never changes.
/// `article` may be null for a comment detached from any article.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Comment {
    pub id: i64,
    pub content: String,
    pub article: Option<i64>,
    pub author: i64,
    #[serde(skip_serializing)]
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub updated_at: DateTime<Utc>,
}

/// Comment body as submitted by clients. Any `author` field is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentPayload {
    pub content: Option<String>,
    /// Absent: untouched. `null`: detached. Number: attached to that article.
    #[serde(default, deserialize_with = "deserialize_some")]
    pub article: Option<Option<i64>>,
}

/// Input for inserting a comment
#[derive(Debug, Clone)]
pub struct CreateCommentInput {
    pub author_id: i64,
    pub content: String,
    pub article_id: Option<i64>,
}

/// Input for updating a comment
#[derive(Debug, Clone, Default)]
pub struct UpdateCommentInput {
    pub content: Option<String>,
    pub article_id: Option<Option<i64>>,
}

// Distinguishes an explicit `null` from a missing field.
fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}
