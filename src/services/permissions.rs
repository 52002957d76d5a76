//! Access control
//!
//! Reads are open to anyone. Every write needs an authenticated requester;
//! updating or deleting an article additionally needs the requester to be
//! one of its authors, and a comment needs the requester to be its author.
//! Tags carry no ownership.

use crate::models::{Article, Comment, Tag, User};

/// Kind of mutation being attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

/// Entity an operation is applied to
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    /// An entity that does not exist yet
    New,
    Article(&'a Article),
    Comment(&'a Comment),
    Tag(&'a Tag),
}

/// Why an operation was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AccessDenied {
    /// No identity was presented
    #[error("Authentication required")]
    AuthenticationRequired,

    /// The requester does not own the target
    #[error("You do not have permission to perform this action")]
    Forbidden,
}

/// Ownership predicate for articles: any member of the author set may edit.
pub fn can_edit_article(user: &User, article: &Article) -> bool {
    article.has_author(user.id)
}

/// Ownership predicate for comments: only the author may edit.
pub fn can_edit_comment(user: &User, comment: &Comment) -> bool {
    comment.author == user.id
}

/// Require an identity before any entity is loaded, so an anonymous write
/// to a missing id reports the missing identity rather than the missing row.
pub fn require_user(user: Option<&User>) -> Result<&User, AccessDenied> {
    user.ok_or(AccessDenied::AuthenticationRequired)
}

/// Check whether `user` may apply `operation` to `target`.
///
/// Returns the authenticated user on success so callers can go on to use the
/// identity without unwrapping it again.
pub fn authorize<'u>(
    user: Option<&'u User>,
    operation: Operation,
    target: Target<'_>,
) -> Result<&'u User, AccessDenied> {
    let user = require_user(user)?;

    let allowed = match (operation, target) {
        (Operation::Create, _) => true,
        (_, Target::New) | (_, Target::Tag(_)) => true,
        (_, Target::Article(article)) => can_edit_article(user, article),
        (_, Target::Comment(comment)) => can_edit_comment(user, comment),
    };

    if allowed {
        Ok(user)
    } else {
        tracing::warn!(
            user_id = user.id,
            operation = ?operation,
            target = %target.describe(),
            "Permission denied"
        );
        Err(AccessDenied::Forbidden)
    }
}

impl Target<'_> {
    fn describe(&self) -> String {
        match self {
            Target::New => "new".to_string(),
            Target::Article(article) => format!("article:{}", article.id),
            Target::Comment(comment) => format!("comment:{}", comment.id),
            Target::Tag(tag) => format!("tag:{}", tag.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use proptest::prelude::*;

    fn user(id: i64) -> User {
        User {
            id,
            username: format!("user{}", id),
            email: format!("user{}@example.com", id),
            password_hash: String::new(),
            created_at: Utc::now(),
        }
    }

    fn article(authors: Vec<i64>) -> Article {
        Article {
            id: 1,
            title: "T".to_string(),
            abstract_text: "A".to_string(),
            publication_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            main_text: "M".to_string(),
            authors,
            tags: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn comment(author: i64) -> Comment {
        Comment {
            id: 1,
            content: "c".to_string(),
            article: None,
            author,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_anonymous_create_requires_authentication() {
        assert_eq!(
            authorize(None, Operation::Create, Target::New).unwrap_err(),
            AccessDenied::AuthenticationRequired
        );
    }

    #[test]
    fn test_authenticated_create_allowed() {
        let u = user(1);
        assert_eq!(authorize(Some(&u), Operation::Create, Target::New).unwrap().id, 1);
    }

    #[test]
    fn test_article_membership() {
        let a = article(vec![1, 2]);
        assert!(authorize(Some(&user(2)), Operation::Update, Target::Article(&a)).is_ok());
        assert_eq!(
            authorize(Some(&user(3)), Operation::Delete, Target::Article(&a)).unwrap_err(),
            AccessDenied::Forbidden
        );
    }

    #[test]
    fn test_comment_author_only() {
        let c = comment(4);
        assert!(authorize(Some(&user(4)), Operation::Update, Target::Comment(&c)).is_ok());
        assert_eq!(
            authorize(Some(&user(5)), Operation::Update, Target::Comment(&c)).unwrap_err(),
            AccessDenied::Forbidden
        );
    }

    #[test]
    fn test_tags_have_no_owner() {
        let tag = Tag {
            id: 1,
            name: "x".to_string(),
        };
        assert!(authorize(Some(&user(9)), Operation::Delete, Target::Tag(&tag)).is_ok());
        assert_eq!(
            authorize(None, Operation::Delete, Target::Tag(&tag)).unwrap_err(),
            AccessDenied::AuthenticationRequired
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        #[test]
        fn prop_article_edit_iff_member(
            authors in prop::collection::vec(1i64..20, 0..6),
            requester in 1i64..20,
        ) {
            let a = article(authors.clone());
            let u = user(requester);
            prop_assert_eq!(can_edit_article(&u, &a), authors.contains(&requester));
            for op in [Operation::Update, Operation::Delete] {
                let result = authorize(Some(&u), op, Target::Article(&a));
                prop_assert_eq!(result.is_ok(), authors.contains(&requester));
            }
        }

        #[test]
        fn prop_comment_edit_iff_author(author in 1i64..20, requester in 1i64..20) {
            let c = comment(author);
            let u = user(requester);
            prop_assert_eq!(can_edit_comment(&u, &c), author == requester);
        }

        #[test]
        fn prop_anonymous_never_authorized(authors in prop::collection::vec(1i64..20, 0..6)) {
            let a = article(authors);
            for op in [Operation::Create, Operation::Update, Operation::Delete] {
                prop_assert_eq!(
                    authorize(None, op, Target::Article(&a)).unwrap_err(),
                    AccessDenied::AuthenticationRequired
                );
            }
        }
    }
}
