//! Tag repository
//!
//! Database operations for tags.
//!
//! This module provides:
//! - `TagRepository` trait defining the interface for tag data access
//! - `SqlxTagRepository` implementing the trait for SQLite and MySQL
//!
//! Tag names are unique; a duplicate insert surfaces as a unique-violation
//! error that callers can detect with [`super::is_unique_violation`].

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Tag;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Tag repository trait
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Create a new tag
    async fn create(&self, name: &str) -> Result<Tag>;

    /// Get tag by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Tag>>;

    /// Get tag by exact name
    async fn get_by_name(&self, name: &str) -> Result<Option<Tag>>;

    /// List tags ordered by id
    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<Tag>>;

    /// Count all tags
    async fn count(&self) -> Result<i64>;

    /// Rename a tag
    async fn update(&self, id: i64, name: &str) -> Result<Tag>;

    /// Delete a tag (article links are removed by cascade)
    async fn delete(&self, id: i64) -> Result<()>;

    /// Tags linked to an article, in link order
    async fn get_by_article_id(&self, article_id: i64) -> Result<Vec<Tag>>;
}

/// SQLx-based tag repository implementation
pub struct SqlxTagRepository {
    pool: DynDatabasePool,
}

impl SqlxTagRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TagRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl TagRepository for SqlxTagRepository {
    async fn create(&self, name: &str) -> Result<Tag> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_tag_sqlite(self.pool.sqlite()?, name).await,
            DatabaseDriver::Mysql => create_tag_mysql(self.pool.mysql()?, name).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Tag>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_tag_by_id_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_tag_by_id_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Tag>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_tag_by_name_sqlite(self.pool.sqlite()?, name).await,
            DatabaseDriver::Mysql => get_tag_by_name_mysql(self.pool.mysql()?, name).await,
        }
    }

    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<Tag>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_tags_sqlite(self.pool.sqlite()?, offset, limit).await,
            DatabaseDriver::Mysql => list_tags_mysql(self.pool.mysql()?, offset, limit).await,
        }
    }

    async fn count(&self) -> Result<i64> {
        let sql = "SELECT COUNT(*) AS count FROM tags";
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to count tags")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to count tags")?
                .get("count"),
        };
        Ok(count)
    }

    async fn update(&self, id: i64, name: &str) -> Result<Tag> {
        let sql = "UPDATE tags SET name = ? WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(name)
                    .bind(id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to update tag")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(name)
                    .bind(id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to update tag")?;
            }
        }
        Ok(Tag {
            id,
            name: name.to_string(),
        })
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let sql = "DELETE FROM tags WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to delete tag")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to delete tag")?;
            }
        }
        Ok(())
    }

    async fn get_by_article_id(&self, article_id: i64) -> Result<Vec<Tag>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_tags_by_article_sqlite(self.pool.sqlite()?, article_id).await
            }
            DatabaseDriver::Mysql => {
                get_tags_by_article_mysql(self.pool.mysql()?, article_id).await
            }
        }
    }
}

const TAGS_BY_ARTICLE: &str = r#"
    SELECT t.id, t.name
    FROM tags t
    INNER JOIN article_tags at ON t.id = at.tag_id
    WHERE at.article_id = ?
    ORDER BY at.id
"#;

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_tag_sqlite(pool: &SqlitePool, name: &str) -> Result<Tag> {
    let result = sqlx::query("INSERT INTO tags (name) VALUES (?)")
        .bind(name)
        .execute(pool)
        .await
        .context("Failed to create tag")?;

    Ok(Tag {
        id: result.last_insert_rowid(),
        name: name.to_string(),
    })
}

async fn get_tag_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Tag>> {
    let row = sqlx::query("SELECT id, name FROM tags WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get tag by ID")?;

    Ok(row.map(|row| row_to_tag_sqlite(&row)))
}

async fn get_tag_by_name_sqlite(pool: &SqlitePool, name: &str) -> Result<Option<Tag>> {
    let row = sqlx::query("SELECT id, name FROM tags WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await
        .context("Failed to get tag by name")?;

    Ok(row.map(|row| row_to_tag_sqlite(&row)))
}

async fn list_tags_sqlite(pool: &SqlitePool, offset: i64, limit: i64) -> Result<Vec<Tag>> {
    let rows = sqlx::query("SELECT id, name FROM tags ORDER BY id LIMIT ? OFFSET ?")
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .context("Failed to list tags")?;

    Ok(rows.iter().map(row_to_tag_sqlite).collect())
}

async fn get_tags_by_article_sqlite(pool: &SqlitePool, article_id: i64) -> Result<Vec<Tag>> {
    let rows = sqlx::query(TAGS_BY_ARTICLE)
        .bind(article_id)
        .fetch_all(pool)
        .await
        .context("Failed to get tags by article")?;

    Ok(rows.iter().map(row_to_tag_sqlite).collect())
}

fn row_to_tag_sqlite(row: &sqlx::sqlite::SqliteRow) -> Tag {
    Tag {
        id: row.get("id"),
        name: row.get("name"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_tag_mysql(pool: &MySqlPool, name: &str) -> Result<Tag> {
    let result = sqlx::query("INSERT INTO tags (name) VALUES (?)")
        .bind(name)
        .execute(pool)
        .await
        .context("Failed to create tag")?;

    Ok(Tag {
        id: result.last_insert_id() as i64,
        name: name.to_string(),
    })
}

async fn get_tag_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Tag>> {
    let row = sqlx::query("SELECT id, name FROM tags WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get tag by ID")?;

    Ok(row.map(|row| row_to_tag_mysql(&row)))
}

async fn get_tag_by_name_mysql(pool: &MySqlPool, name: &str) -> Result<Option<Tag>> {
    let row = sqlx::query("SELECT id, name FROM tags WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await
        .context("Failed to get tag by name")?;

    Ok(row.map(|row| row_to_tag_mysql(&row)))
}

async fn list_tags_mysql(pool: &MySqlPool, offset: i64, limit: i64) -> Result<Vec<Tag>> {
    let rows = sqlx::query("SELECT id, name FROM tags ORDER BY id LIMIT ? OFFSET ?")
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .context("Failed to list tags")?;

    Ok(rows.iter().map(row_to_tag_mysql).collect())
}

async fn get_tags_by_article_mysql(pool: &MySqlPool, article_id: i64) -> Result<Vec<Tag>> {
    let rows = sqlx::query(TAGS_BY_ARTICLE)
        .bind(article_id)
        .fetch_all(pool)
        .await
        .context("Failed to get tags by article")?;

    Ok(rows.iter().map(row_to_tag_mysql).collect())
}

fn row_to_tag_mysql(row: &sqlx::mysql::MySqlRow) -> Tag {
    Tag {
        id: row.get("id"),
        name: row.get("name"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::is_unique_violation;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> (DynDatabasePool, SqlxTagRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxTagRepository::new(pool.clone());
        (pool, repo)
    }

    async fn create_test_article(pool: &SqlitePool) -> i64 {
        sqlx::query(
            "INSERT INTO articles (title, abstract, main_text, publication_date) VALUES ('T', 'A', 'M', '2025-01-01')",
        )
        .execute(pool)
        .await
        .expect("Failed to create test article")
        .last_insert_rowid()
    }

    async fn link(pool: &SqlitePool, article_id: i64, tag_id: i64) {
        sqlx::query("INSERT INTO article_tags (article_id, tag_id) VALUES (?, ?)")
            .bind(article_id)
            .bind(tag_id)
            .execute(pool)
            .await
            .expect("Failed to link tag");
    }

    #[tokio::test]
    async fn test_create_tag() {
        let (_pool, repo) = setup_test_repo().await;

        let tag = repo.create("rust").await.expect("Failed to create tag");

        assert!(tag.id > 0);
        assert_eq!(tag.name, "rust");
    }

    #[tokio::test]
    async fn test_duplicate_name_is_unique_violation() {
        let (_pool, repo) = setup_test_repo().await;

        repo.create("rust").await.unwrap();
        let err = repo.create("rust").await.unwrap_err();

        assert!(is_unique_violation(&err));
    }

    #[tokio::test]
    async fn test_get_tag_by_id_and_name() {
        let (_pool, repo) = setup_test_repo().await;

        let created = repo.create("news").await.unwrap();

        assert_eq!(repo.get_by_id(created.id).await.unwrap(), Some(created.clone()));
        assert_eq!(repo.get_by_name("news").await.unwrap(), Some(created));
        assert!(repo.get_by_id(999).await.unwrap().is_none());
        assert!(repo.get_by_name("News").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_tags_ordered_by_id() {
        let (_pool, repo) = setup_test_repo().await;

        for name in ["zeta", "alpha", "mid"] {
            repo.create(name).await.unwrap();
        }

        let tags = repo.list(0, 10).await.unwrap();
        let names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
        assert_eq!(repo.count().await.unwrap(), 3);

        let page = repo.list(1, 1).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].name, "alpha");
    }

    #[tokio::test]
    async fn test_update_tag() {
        let (_pool, repo) = setup_test_repo().await;

        let tag = repo.create("old").await.unwrap();
        let updated = repo.update(tag.id, "new").await.unwrap();

        assert_eq!(updated.name, "new");
        assert_eq!(repo.get_by_id(tag.id).await.unwrap().unwrap().name, "new");
    }

    #[tokio::test]
    async fn test_tags_by_article_in_link_order() {
        let (pool, repo) = setup_test_repo().await;
        let sqlite = pool.as_sqlite().unwrap();

        let article_id = create_test_article(sqlite).await;
        let a = repo.create("a").await.unwrap();
        let b = repo.create("b").await.unwrap();
        link(sqlite, article_id, b.id).await;
        link(sqlite, article_id, a.id).await;

        let tags = repo.get_by_article_id(article_id).await.unwrap();
        assert_eq!(tags, vec![b, a]);
    }

    #[tokio::test]
    async fn test_delete_tag_removes_links_only() {
        let (pool, repo) = setup_test_repo().await;
        let sqlite = pool.as_sqlite().unwrap();

        let article_id = create_test_article(sqlite).await;
        let tag = repo.create("doomed").await.unwrap();
        link(sqlite, article_id, tag.id).await;

        repo.delete(tag.id).await.unwrap();

        assert!(repo.get_by_article_id(article_id).await.unwrap().is_empty());
        let row = sqlx::query("SELECT COUNT(*) AS count FROM articles")
            .fetch_one(sqlite)
            .await
            .unwrap();
        assert_eq!(row.get::<i64, _>("count"), 1);
    }
}
