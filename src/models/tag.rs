//! Tag model

use serde::{Deserialize, Serialize};

/// A free-form label attached to articles. Names are unique across all tags.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    /// Unique identifier
    pub id: i64,
    /// Tag name
    pub name: String,
}

/// Tag as submitted by clients, both on the tag endpoints and nested inside
/// an article payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TagPayload {
    pub name: Option<String>,
}

impl TagPayload {
    pub fn named(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
        }
    }
}
