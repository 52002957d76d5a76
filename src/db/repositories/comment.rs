//! Comment repository
//!
//! Database operations for comments. A comment may be attached to an article
//! or stand alone (`article_id` NULL); deleting the article or the author
//! removes the comment through the schema's cascades.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Comment, CreateCommentInput, UpdateCommentInput};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Comment repository trait
#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Create a new comment
    async fn create(&self, input: &CreateCommentInput) -> Result<Comment>;

    /// Get comment by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>>;

    /// List comments ordered by id, optionally only those of one article
    async fn list(&self, article_id: Option<i64>, offset: i64, limit: i64) -> Result<Vec<Comment>>;

    /// Count comments, optionally only those of one article
    async fn count(&self, article_id: Option<i64>) -> Result<i64>;

    /// Apply a partial update
    async fn update(&self, id: i64, input: &UpdateCommentInput) -> Result<Comment>;

    /// Delete a comment
    async fn delete(&self, id: i64) -> Result<()>;
}

/// SQLx-based comment repository implementation
pub struct SqlxCommentRepository {
    pool: DynDatabasePool,
}

impl SqlxCommentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CommentRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn create(&self, input: &CreateCommentInput) -> Result<Comment> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_comment_sqlite(self.pool.sqlite()?, input).await,
            DatabaseDriver::Mysql => create_comment_mysql(self.pool.mysql()?, input).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_comment_by_id_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_comment_by_id_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn list(&self, article_id: Option<i64>, offset: i64, limit: i64) -> Result<Vec<Comment>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_comments_sqlite(self.pool.sqlite()?, article_id, offset, limit).await
            }
            DatabaseDriver::Mysql => {
                list_comments_mysql(self.pool.mysql()?, article_id, offset, limit).await
            }
        }
    }

    async fn count(&self, article_id: Option<i64>) -> Result<i64> {
        let sql = match article_id {
            Some(_) => "SELECT COUNT(*) AS count FROM comments WHERE article_id = ?",
            None => "SELECT COUNT(*) AS count FROM comments",
        };
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut query = sqlx::query(sql);
                if let Some(article_id) = article_id {
                    query = query.bind(article_id);
                }
                query
                    .fetch_one(self.pool.sqlite()?)
                    .await
                    .context("Failed to count comments")?
                    .get("count")
            }
            DatabaseDriver::Mysql => {
                let mut query = sqlx::query(sql);
                if let Some(article_id) = article_id {
                    query = query.bind(article_id);
                }
                query
                    .fetch_one(self.pool.mysql()?)
                    .await
                    .context("Failed to count comments")?
                    .get("count")
            }
        };
        Ok(count)
    }

    async fn update(&self, id: i64, input: &UpdateCommentInput) -> Result<Comment> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_comment_sqlite(self.pool.sqlite()?, id, input).await?,
            DatabaseDriver::Mysql => update_comment_mysql(self.pool.mysql()?, id, input).await?,
        }
        self.get_by_id(id)
            .await?
            .with_context(|| format!("Comment {} missing after update", id))
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let sql = "DELETE FROM comments WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to delete comment")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to delete comment")?;
            }
        }
        Ok(())
    }
}

const SELECT_COMMENT: &str =
    "SELECT id, author_id, content, article_id, created_at, updated_at FROM comments";

/// `UPDATE` statement for the columns present in `input`
fn update_sql(input: &UpdateCommentInput) -> String {
    let mut assignments = Vec::new();
    if input.content.is_some() {
        assignments.push("content = ?");
    }
    if input.article_id.is_some() {
        assignments.push("article_id = ?");
    }
    assignments.push("updated_at = ?");
    format!("UPDATE comments SET {} WHERE id = ?", assignments.join(", "))
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_comment_sqlite(pool: &SqlitePool, input: &CreateCommentInput) -> Result<Comment> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO comments (author_id, content, article_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(input.author_id)
    .bind(&input.content)
    .bind(input.article_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create comment")?;

    Ok(Comment {
        id: result.last_insert_rowid(),
        content: input.content.clone(),
        article: input.article_id,
        author: input.author_id,
        created_at: now,
        updated_at: now,
    })
}

async fn get_comment_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Comment>> {
    let sql = format!("{} WHERE id = ?", SELECT_COMMENT);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get comment by ID")?;

    Ok(row.map(|row| row_to_comment_sqlite(&row)))
}

async fn list_comments_sqlite(
    pool: &SqlitePool,
    article_id: Option<i64>,
    offset: i64,
    limit: i64,
) -> Result<Vec<Comment>> {
    let rows = match article_id {
        Some(article_id) => {
            let sql = format!("{} WHERE article_id = ? ORDER BY id LIMIT ? OFFSET ?", SELECT_COMMENT);
            sqlx::query(&sql)
                .bind(article_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(pool)
                .await
        }
        None => {
            let sql = format!("{} ORDER BY id LIMIT ? OFFSET ?", SELECT_COMMENT);
            sqlx::query(&sql).bind(limit).bind(offset).fetch_all(pool).await
        }
    }
    .context("Failed to list comments")?;

    Ok(rows.iter().map(row_to_comment_sqlite).collect())
}

async fn update_comment_sqlite(pool: &SqlitePool, id: i64, input: &UpdateCommentInput) -> Result<()> {
    let sql = update_sql(input);
    let mut query = sqlx::query(&sql);
    if let Some(content) = &input.content {
        query = query.bind(content);
    }
    if let Some(article_id) = input.article_id {
        query = query.bind(article_id);
    }
    query
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update comment")?;
    Ok(())
}

fn row_to_comment_sqlite(row: &sqlx::sqlite::SqliteRow) -> Comment {
    Comment {
        id: row.get("id"),
        content: row.get("content"),
        article: row.get("article_id"),
        author: row.get("author_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_comment_mysql(pool: &MySqlPool, input: &CreateCommentInput) -> Result<Comment> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO comments (author_id, content, article_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(input.author_id)
    .bind(&input.content)
    .bind(input.article_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create comment")?;

    Ok(Comment {
        id: result.last_insert_id() as i64,
        content: input.content.clone(),
        article: input.article_id,
        author: input.author_id,
        created_at: now,
        updated_at: now,
    })
}

async fn get_comment_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Comment>> {
    let sql = format!("{} WHERE id = ?", SELECT_COMMENT);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get comment by ID")?;

    Ok(row.map(|row| row_to_comment_mysql(&row)))
}

async fn list_comments_mysql(
    pool: &MySqlPool,
    article_id: Option<i64>,
    offset: i64,
    limit: i64,
) -> Result<Vec<Comment>> {
    let rows = match article_id {
        Some(article_id) => {
            let sql = format!("{} WHERE article_id = ? ORDER BY id LIMIT ? OFFSET ?", SELECT_COMMENT);
            sqlx::query(&sql)
                .bind(article_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(pool)
                .await
        }
        None => {
            let sql = format!("{} ORDER BY id LIMIT ? OFFSET ?", SELECT_COMMENT);
            sqlx::query(&sql).bind(limit).bind(offset).fetch_all(pool).await
        }
    }
    .context("Failed to list comments")?;

    Ok(rows.iter().map(row_to_comment_mysql).collect())
}

async fn update_comment_mysql(pool: &MySqlPool, id: i64, input: &UpdateCommentInput) -> Result<()> {
    let sql = update_sql(input);
    let mut query = sqlx::query(&sql);
    if let Some(content) = &input.content {
        query = query.bind(content);
    }
    if let Some(article_id) = input.article_id {
        query = query.bind(article_id);
    }
    query
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update comment")?;
    Ok(())
}

fn row_to_comment_mysql(row: &sqlx::mysql::MySqlRow) -> Comment {
    Comment {
        id: row.get("id"),
        content: row.get("content"),
        article: row.get("article_id"),
        author: row.get("author_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
