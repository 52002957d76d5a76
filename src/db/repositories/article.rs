//! Article repository
//!
//! Database operations for articles and their author/tag membership.
//!
//! This module provides:
//! - `ArticleRepository` trait defining the interface for article data access
//! - `SqlxArticleRepository` implementing the trait for SQLite and MySQL
//!
//! Creation and update write the article row and both membership sets in a
//! single transaction. Membership `set` deletes every link and re-inserts the
//! new list; `add` inserts a link only when it is absent. Link rows carry an
//! auto-increment id, and reading them back `ORDER BY` that id yields the
//! order in which members were written.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{
    Article, ArticleExportRow, ArticleFilter, CreateArticleInput, UpdateArticleInput,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::mysql::{MySql, MySqlArguments, MySqlConnection};
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteConnection};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Article repository trait
#[async_trait]
pub trait ArticleRepository: Send + Sync {
    /// Insert an article with its author and tag sets
    async fn create(&self, input: &CreateArticleInput) -> Result<Article>;

    /// Get article by ID, with authors and tags loaded
    async fn get_by_id(&self, id: i64) -> Result<Option<Article>>;

    /// Check whether an article exists
    async fn exists(&self, id: i64) -> Result<bool>;

    /// List articles matching `filter`, ordered by id
    async fn list(&self, filter: &ArticleFilter, offset: i64, limit: i64) -> Result<Vec<Article>>;

    /// Count articles matching `filter`
    async fn count(&self, filter: &ArticleFilter) -> Result<i64>;

    /// Apply a partial update; membership sets present in `input` are replaced
    async fn update(&self, id: i64, input: &UpdateArticleInput) -> Result<Article>;

    /// Delete an article (comments and membership links cascade)
    async fn delete(&self, id: i64) -> Result<()>;

    /// Add a user to the author set if not already a member.
    ///
    /// `create` performs the same insert inside its own transaction; this is
    /// the standalone form for callers outside one.
    async fn add_author(&self, article_id: i64, user_id: i64) -> Result<()>;

    /// Every article matching `filter`, ordered by id, with author usernames
    /// and tag names resolved
    async fn export_rows(&self, filter: &ArticleFilter) -> Result<Vec<ArticleExportRow>>;
}

/// SQLx-based article repository implementation
pub struct SqlxArticleRepository {
    pool: DynDatabasePool,
}

impl SqlxArticleRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ArticleRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ArticleRepository for SqlxArticleRepository {
    async fn create(&self, input: &CreateArticleInput) -> Result<Article> {
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => create_article_sqlite(self.pool.sqlite()?, input).await?,
            DatabaseDriver::Mysql => create_article_mysql(self.pool.mysql()?, input).await?,
        };
        self.get_by_id(id)
            .await?
            .with_context(|| format!("Article {} missing after insert", id))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Article>> {
        let filter = ArticleFilter {
            id: Some(id),
            ..Default::default()
        };
        let mut articles = self.list(&filter, 0, 1).await?;
        Ok(articles.pop())
    }

    async fn exists(&self, id: i64) -> Result<bool> {
        let sql = "SELECT id FROM articles WHERE id = ?";
        let found = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .fetch_optional(self.pool.sqlite()?)
                .await
                .context("Failed to check article existence")?
                .is_some(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .fetch_optional(self.pool.mysql()?)
                .await
                .context("Failed to check article existence")?
                .is_some(),
        };
        Ok(found)
    }

    async fn list(&self, filter: &ArticleFilter, offset: i64, limit: i64) -> Result<Vec<Article>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_articles_sqlite(self.pool.sqlite()?, filter, Some((offset, limit))).await
            }
            DatabaseDriver::Mysql => {
                list_articles_mysql(self.pool.mysql()?, filter, Some((offset, limit))).await
            }
        }
    }

    async fn count(&self, filter: &ArticleFilter) -> Result<i64> {
        let (where_clause, values) = filter_clause(filter);
        let sql = format!("SELECT COUNT(*) AS count FROM articles a{}", where_clause);
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => bind_sqlite(sqlx::query(&sql), &values)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to count articles")?
                .get("count"),
            DatabaseDriver::Mysql => bind_mysql(sqlx::query(&sql), &values)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to count articles")?
                .get("count"),
        };
        Ok(count)
    }

    async fn update(&self, id: i64, input: &UpdateArticleInput) -> Result<Article> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_article_sqlite(self.pool.sqlite()?, id, input).await?,
            DatabaseDriver::Mysql => update_article_mysql(self.pool.mysql()?, id, input).await?,
        }
        self.get_by_id(id)
            .await?
            .with_context(|| format!("Article {} missing after update", id))
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let sql = "DELETE FROM articles WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to delete article")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to delete article")?;
            }
        }
        Ok(())
    }

    async fn add_author(&self, article_id: i64, user_id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut conn = self.pool.sqlite()?.acquire().await?;
                add_author_sqlite(&mut conn, article_id, user_id).await
            }
            DatabaseDriver::Mysql => {
                let mut conn = self.pool.mysql()?.acquire().await?;
                add_author_mysql(&mut conn, article_id, user_id).await
            }
        }
    }

    async fn export_rows(&self, filter: &ArticleFilter) -> Result<Vec<ArticleExportRow>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => export_rows_sqlite(self.pool.sqlite()?, filter).await,
            DatabaseDriver::Mysql => export_rows_mysql(self.pool.mysql()?, filter).await,
        }
    }
}

// ============================================================================
// Shared SQL
// ============================================================================

const SELECT_ARTICLE: &str = r#"
    SELECT a.id, a.title, a.abstract, a.main_text, a.publication_date, a.created_at, a.updated_at
    FROM articles a"#;

const INSERT_ARTICLE: &str = r#"
    INSERT INTO articles (title, abstract, main_text, publication_date, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?)
"#;

const AUTHOR_IDS: &str = "SELECT user_id FROM article_authors WHERE article_id = ? ORDER BY id";

const AUTHOR_NAMES: &str = r#"
    SELECT u.username
    FROM users u
    INNER JOIN article_authors aa ON u.id = aa.user_id
    WHERE aa.article_id = ?
    ORDER BY aa.id
"#;

const TAGS_OF_ARTICLE: &str = r#"
    SELECT t.id, t.name
    FROM tags t
    INNER JOIN article_tags at ON t.id = at.tag_id
    WHERE at.article_id = ?
    ORDER BY at.id
"#;

/// A value bound into a dynamically composed statement
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SqlValue {
    Int(i64),
    Date(NaiveDate),
    Text(String),
    Timestamp(DateTime<Utc>),
}

/// Compose the `WHERE` clause for an article filter.
///
/// Returns an empty string when the filter does not restrict anything.
/// Predicates are joined with `AND`; the search term matches title,
/// abstract or main text case-insensitively. Column and term are folded by
/// the same `LOWER()`, so both sides agree on what a case is (ASCII only on
/// SQLite).
pub(crate) fn filter_clause(filter: &ArticleFilter) -> (String, Vec<SqlValue>) {
    let mut conditions: Vec<&'static str> = Vec::new();
    let mut values = Vec::new();

    if let Some(id) = filter.id {
        conditions.push("a.id = ?");
        values.push(SqlValue::Int(id));
    }
    if let Some(date) = filter.publication_date {
        conditions.push("a.publication_date = ?");
        values.push(SqlValue::Date(date));
    }
    if let Some(user_id) = filter.author {
        conditions.push("a.id IN (SELECT article_id FROM article_authors WHERE user_id = ?)");
        values.push(SqlValue::Int(user_id));
    }
    if let Some(tag_id) = filter.tag {
        conditions.push("a.id IN (SELECT article_id FROM article_tags WHERE tag_id = ?)");
        values.push(SqlValue::Int(tag_id));
    }
    if let Some(term) = &filter.search {
        conditions.push(
            "(LOWER(a.title) LIKE LOWER(?) ESCAPE '!' OR LOWER(a.abstract) LIKE LOWER(?) ESCAPE '!' OR LOWER(a.main_text) LIKE LOWER(?) ESCAPE '!')",
        );
        let pattern = like_pattern(term);
        for _ in 0..3 {
            values.push(SqlValue::Text(pattern.clone()));
        }
    }

    if conditions.is_empty() {
        (String::new(), values)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), values)
    }
}

/// `%term%` with LIKE wildcards escaped by `!`
pub(crate) fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '!' | '%' | '_') {
            escaped.push('!');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// `SET` assignments for the scalar columns present in `input`.
/// `updated_at` is always refreshed.
fn update_clause(input: &UpdateArticleInput) -> (String, Vec<SqlValue>) {
    let mut assignments: Vec<&'static str> = Vec::new();
    let mut values = Vec::new();

    if let Some(title) = &input.title {
        assignments.push("title = ?");
        values.push(SqlValue::Text(title.clone()));
    }
    if let Some(abstract_text) = &input.abstract_text {
        assignments.push("abstract = ?");
        values.push(SqlValue::Text(abstract_text.clone()));
    }
    if let Some(main_text) = &input.main_text {
        assignments.push("main_text = ?");
        values.push(SqlValue::Text(main_text.clone()));
    }
    if let Some(date) = input.publication_date {
        assignments.push("publication_date = ?");
        values.push(SqlValue::Date(date));
    }
    assignments.push("updated_at = ?");
    values.push(SqlValue::Timestamp(Utc::now()));

    (assignments.join(", "), values)
}

/// Drop repeated ids, keeping the first occurrence
fn unique_in_order(ids: &[i64]) -> Vec<i64> {
    let mut seen = Vec::with_capacity(ids.len());
    for id in ids {
        if !seen.contains(id) {
            seen.push(*id);
        }
    }
    seen
}

fn list_sql(filter: &ArticleFilter, page: Option<(i64, i64)>) -> (String, Vec<SqlValue>) {
    let (where_clause, mut values) = filter_clause(filter);
    let mut sql = format!("{}{} ORDER BY a.id", SELECT_ARTICLE, where_clause);
    if let Some((offset, limit)) = page {
        sql.push_str(" LIMIT ? OFFSET ?");
        values.push(SqlValue::Int(limit));
        values.push(SqlValue::Int(offset));
    }
    (sql, values)
}

// ============================================================================
// SQLite implementations
// ============================================================================

fn bind_sqlite<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    values: &[SqlValue],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for value in values {
        query = match value {
            SqlValue::Int(v) => query.bind(*v),
            SqlValue::Date(v) => query.bind(*v),
            SqlValue::Text(v) => query.bind(v.clone()),
            SqlValue::Timestamp(v) => query.bind(*v),
        };
    }
    query
}

async fn create_article_sqlite(pool: &SqlitePool, input: &CreateArticleInput) -> Result<i64> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let result = sqlx::query(INSERT_ARTICLE)
        .bind(&input.title)
        .bind(&input.abstract_text)
        .bind(&input.main_text)
        .bind(input.publication_date)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to create article")?;
    let id = result.last_insert_rowid();

    set_authors_sqlite(&mut tx, id, &input.author_ids).await?;
    add_author_sqlite(&mut tx, id, input.creator_id).await?;
    set_tags_sqlite(&mut tx, id, &input.tag_ids).await?;

    tx.commit().await.context("Failed to commit article creation")?;
    Ok(id)
}

async fn update_article_sqlite(pool: &SqlitePool, id: i64, input: &UpdateArticleInput) -> Result<()> {
    let (set_clause, values) = update_clause(input);
    let sql = format!("UPDATE articles SET {} WHERE id = ?", set_clause);

    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    bind_sqlite(sqlx::query(&sql), &values)
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to update article")?;

    if let Some(author_ids) = &input.author_ids {
        set_authors_sqlite(&mut tx, id, author_ids).await?;
    }
    if let Some(tag_ids) = &input.tag_ids {
        set_tags_sqlite(&mut tx, id, tag_ids).await?;
    }

    tx.commit().await.context("Failed to commit article update")?;
    Ok(())
}

async fn set_authors_sqlite(conn: &mut SqliteConnection, article_id: i64, user_ids: &[i64]) -> Result<()> {
    sqlx::query("DELETE FROM article_authors WHERE article_id = ?")
        .bind(article_id)
        .execute(&mut *conn)
        .await
        .context("Failed to clear article authors")?;

    for user_id in unique_in_order(user_ids) {
        sqlx::query("INSERT INTO article_authors (article_id, user_id) VALUES (?, ?)")
            .bind(article_id)
            .bind(user_id)
            .execute(&mut *conn)
            .await
            .with_context(|| format!("Failed to add author {}", user_id))?;
    }
    Ok(())
}

async fn add_author_sqlite(conn: &mut SqliteConnection, article_id: i64, user_id: i64) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO article_authors (article_id, user_id) VALUES (?, ?)")
        .bind(article_id)
        .bind(user_id)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("Failed to add author {}", user_id))?;
    Ok(())
}

async fn set_tags_sqlite(conn: &mut SqliteConnection, article_id: i64, tag_ids: &[i64]) -> Result<()> {
    sqlx::query("DELETE FROM article_tags WHERE article_id = ?")
        .bind(article_id)
        .execute(&mut *conn)
        .await
        .context("Failed to clear article tags")?;

    for tag_id in unique_in_order(tag_ids) {
        sqlx::query("INSERT INTO article_tags (article_id, tag_id) VALUES (?, ?)")
            .bind(article_id)
            .bind(tag_id)
            .execute(&mut *conn)
            .await
            .with_context(|| format!("Failed to add tag {}", tag_id))?;
    }
    Ok(())
}

async fn list_articles_sqlite(
    pool: &SqlitePool,
    filter: &ArticleFilter,
    page: Option<(i64, i64)>,
) -> Result<Vec<Article>> {
    let (sql, values) = list_sql(filter, page);
    let rows = bind_sqlite(sqlx::query(&sql), &values)
        .fetch_all(pool)
        .await
        .context("Failed to list articles")?;

    let mut articles = Vec::with_capacity(rows.len());
    for row in rows {
        let mut article = row_to_article_sqlite(&row);
        load_membership_sqlite(pool, &mut article).await?;
        articles.push(article);
    }
    Ok(articles)
}

async fn load_membership_sqlite(pool: &SqlitePool, article: &mut Article) -> Result<()> {
    article.authors = sqlx::query(AUTHOR_IDS)
        .bind(article.id)
        .fetch_all(pool)
        .await
        .context("Failed to load article authors")?
        .iter()
        .map(|row| row.get("user_id"))
        .collect();

    article.tags = sqlx::query(TAGS_OF_ARTICLE)
        .bind(article.id)
        .fetch_all(pool)
        .await
        .context("Failed to load article tags")?
        .iter()
        .map(|row| crate::models::Tag {
            id: row.get("id"),
            name: row.get("name"),
        })
        .collect();
    Ok(())
}

async fn export_rows_sqlite(pool: &SqlitePool, filter: &ArticleFilter) -> Result<Vec<ArticleExportRow>> {
    let (sql, values) = list_sql(filter, None);
    let rows = bind_sqlite(sqlx::query(&sql), &values)
        .fetch_all(pool)
        .await
        .context("Failed to list articles for export")?;

    let mut export = Vec::with_capacity(rows.len());
    for row in rows {
        let article = row_to_article_sqlite(&row);
        let authors: Vec<String> = sqlx::query(AUTHOR_NAMES)
            .bind(article.id)
            .fetch_all(pool)
            .await
            .context("Failed to load author names")?
            .iter()
            .map(|r| r.get("username"))
            .collect();
        let tags: Vec<String> = sqlx::query(TAGS_OF_ARTICLE)
            .bind(article.id)
            .fetch_all(pool)
            .await
            .context("Failed to load tag names")?
            .iter()
            .map(|r| r.get("name"))
            .collect();

        export.push(ArticleExportRow {
            id: article.id,
            title: article.title,
            abstract_text: article.abstract_text,
            publication_date: article.publication_date,
            authors,
            tags,
        });
    }
    Ok(export)
}

fn row_to_article_sqlite(row: &sqlx::sqlite::SqliteRow) -> Article {
    Article {
        id: row.get("id"),
        title: row.get("title"),
        abstract_text: row.get("abstract"),
        publication_date: row.get("publication_date"),
        main_text: row.get("main_text"),
        authors: Vec::new(),
        tags: Vec::new(),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

fn bind_mysql<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    values: &[SqlValue],
) -> Query<'q, MySql, MySqlArguments> {
    for value in values {
        query = match value {
            SqlValue::Int(v) => query.bind(*v),
            SqlValue::Date(v) => query.bind(*v),
            SqlValue::Text(v) => query.bind(v.clone()),
            SqlValue::Timestamp(v) => query.bind(*v),
        };
    }
    query
}

async fn create_article_mysql(pool: &MySqlPool, input: &CreateArticleInput) -> Result<i64> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let result = sqlx::query(INSERT_ARTICLE)
        .bind(&input.title)
        .bind(&input.abstract_text)
        .bind(&input.main_text)
        .bind(input.publication_date)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to create article")?;
    let id = result.last_insert_id() as i64;

    set_authors_mysql(&mut tx, id, &input.author_ids).await?;
    add_author_mysql(&mut tx, id, input.creator_id).await?;
    set_tags_mysql(&mut tx, id, &input.tag_ids).await?;

    tx.commit().await.context("Failed to commit article creation")?;
    Ok(id)
}

async fn update_article_mysql(pool: &MySqlPool, id: i64, input: &UpdateArticleInput) -> Result<()> {
    let (set_clause, values) = update_clause(input);
    let sql = format!("UPDATE articles SET {} WHERE id = ?", set_clause);

    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    bind_mysql(sqlx::query(&sql), &values)
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to update article")?;

    if let Some(author_ids) = &input.author_ids {
        set_authors_mysql(&mut tx, id, author_ids).await?;
    }
    if let Some(tag_ids) = &input.tag_ids {
        set_tags_mysql(&mut tx, id, tag_ids).await?;
    }

    tx.commit().await.context("Failed to commit article update")?;
    Ok(())
}

async fn set_authors_mysql(conn: &mut MySqlConnection, article_id: i64, user_ids: &[i64]) -> Result<()> {
    sqlx::query("DELETE FROM article_authors WHERE article_id = ?")
        .bind(article_id)
        .execute(&mut *conn)
        .await
        .context("Failed to clear article authors")?;

    for user_id in unique_in_order(user_ids) {
        sqlx::query("INSERT INTO article_authors (article_id, user_id) VALUES (?, ?)")
            .bind(article_id)
            .bind(user_id)
            .execute(&mut *conn)
            .await
            .with_context(|| format!("Failed to add author {}", user_id))?;
    }
    Ok(())
}

async fn add_author_mysql(conn: &mut MySqlConnection, article_id: i64, user_id: i64) -> Result<()> {
    sqlx::query("INSERT IGNORE INTO article_authors (article_id, user_id) VALUES (?, ?)")
        .bind(article_id)
        .bind(user_id)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("Failed to add author {}", user_id))?;
    Ok(())
}

async fn set_tags_mysql(conn: &mut MySqlConnection, article_id: i64, tag_ids: &[i64]) -> Result<()> {
    sqlx::query("DELETE FROM article_tags WHERE article_id = ?")
        .bind(article_id)
        .execute(&mut *conn)
        .await
        .context("Failed to clear article tags")?;

    for tag_id in unique_in_order(tag_ids) {
        sqlx::query("INSERT INTO article_tags (article_id, tag_id) VALUES (?, ?)")
            .bind(article_id)
            .bind(tag_id)
            .execute(&mut *conn)
            .await
            .with_context(|| format!("Failed to add tag {}", tag_id))?;
    }
    Ok(())
}

async fn list_articles_mysql(
    pool: &MySqlPool,
    filter: &ArticleFilter,
    page: Option<(i64, i64)>,
) -> Result<Vec<Article>> {
    let (sql, values) = list_sql(filter, page);
    let rows = bind_mysql(sqlx::query(&sql), &values)
        .fetch_all(pool)
        .await
        .context("Failed to list articles")?;

    let mut articles = Vec::with_capacity(rows.len());
    for row in rows {
        let mut article = row_to_article_mysql(&row);
        load_membership_mysql(pool, &mut article).await?;
        articles.push(article);
    }
    Ok(articles)
}

async fn load_membership_mysql(pool: &MySqlPool, article: &mut Article) -> Result<()> {
    article.authors = sqlx::query(AUTHOR_IDS)
        .bind(article.id)
        .fetch_all(pool)
        .await
        .context("Failed to load article authors")?
        .iter()
        .map(|row| row.get("user_id"))
        .collect();

    article.tags = sqlx::query(TAGS_OF_ARTICLE)
        .bind(article.id)
        .fetch_all(pool)
        .await
        .context("Failed to load article tags")?
        .iter()
        .map(|row| crate::models::Tag {
            id: row.get("id"),
            name: row.get("name"),
        })
        .collect();
    Ok(())
}

async fn export_rows_mysql(pool: &MySqlPool, filter: &ArticleFilter) -> Result<Vec<ArticleExportRow>> {
    let (sql, values) = list_sql(filter, None);
    let rows = bind_mysql(sqlx::query(&sql), &values)
        .fetch_all(pool)
        .await
        .context("Failed to list articles for export")?;

    let mut export = Vec::with_capacity(rows.len());
    for row in rows {
        let article = row_to_article_mysql(&row);
        let authors: Vec<String> = sqlx::query(AUTHOR_NAMES)
            .bind(article.id)
            .fetch_all(pool)
            .await
            .context("Failed to load author names")?
            .iter()
            .map(|r| r.get("username"))
            .collect();
        let tags: Vec<String> = sqlx::query(TAGS_OF_ARTICLE)
            .bind(article.id)
            .fetch_all(pool)
            .await
            .context("Failed to load tag names")?
            .iter()
            .map(|r| r.get("name"))
            .collect();

        export.push(ArticleExportRow {
            id: article.id,
            title: article.title,
            abstract_text: article.abstract_text,
            publication_date: article.publication_date,
            authors,
            tags,
        });
    }
    Ok(export)
}

fn row_to_article_mysql(row: &sqlx::mysql::MySqlRow) -> Article {
    Article {
        id: row.get("id"),
        title: row.get("title"),
        abstract_text: row.get("abstract"),
        publication_date: row.get("publication_date"),
        main_text: row.get("main_text"),
        authors: Vec::new(),
        tags: Vec::new(),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use proptest::prelude::*;

    async fn setup_test_repo() -> (DynDatabasePool, SqlxArticleRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxArticleRepository::new(pool.clone());
        (pool, repo)
    }

    async fn create_test_user(pool: &DynDatabasePool, username: &str) -> i64 {
        sqlx::query("INSERT INTO users (username, email, password_hash) VALUES (?, ?, 'h')")
            .bind(username)
            .bind(format!("{}@example.com", username))
            .execute(pool.as_sqlite().unwrap())
            .await
            .expect("Failed to create test user")
            .last_insert_rowid()
    }

    async fn create_test_tag(pool: &DynDatabasePool, name: &str) -> i64 {
        sqlx::query("INSERT INTO tags (name) VALUES (?)")
            .bind(name)
            .execute(pool.as_sqlite().unwrap())
            .await
            .expect("Failed to create test tag")
            .last_insert_rowid()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn input(title: &str, creator_id: i64) -> CreateArticleInput {
        CreateArticleInput {
            title: title.to_string(),
            abstract_text: "Abstract".to_string(),
            main_text: "Body".to_string(),
            publication_date: date(2025, 1, 1),
            creator_id,
            author_ids: Vec::new(),
            tag_ids: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_create_adds_creator_to_authors() {
        let (pool, repo) = setup_test_repo().await;
        let alice = create_test_user(&pool, "alice").await;

        let article = repo.create(&input("T", alice)).await.unwrap();

        assert!(article.id > 0);
        assert_eq!(article.title, "T");
        assert_eq!(article.publication_date, date(2025, 1, 1));
        assert_eq!(article.authors, vec![alice]);
    }

    #[tokio::test]
    async fn test_create_unions_payload_authors_with_creator() {
        let (pool, repo) = setup_test_repo().await;
        let alice = create_test_user(&pool, "alice").await;
        let bob = create_test_user(&pool, "bob").await;

        let mut with_bob = input("T", alice);
        with_bob.author_ids = vec![bob, bob];
        let article = repo.create(&with_bob).await.unwrap();
        assert_eq!(article.authors, vec![bob, alice]);

        let mut with_both = input("U", alice);
        with_both.author_ids = vec![alice, bob];
        let article = repo.create(&with_both).await.unwrap();
        assert_eq!(article.authors, vec![alice, bob]);
    }

    #[tokio::test]
    async fn test_create_keeps_tag_order() {
        let (pool, repo) = setup_test_repo().await;
        let alice = create_test_user(&pool, "alice").await;
        let x = create_test_tag(&pool, "x").await;
        let y = create_test_tag(&pool, "y").await;

        let mut tagged = input("T", alice);
        tagged.tag_ids = vec![y, x];
        let article = repo.create(&tagged).await.unwrap();

        let names: Vec<&str> = article.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["y", "x"]);
    }

    #[tokio::test]
    async fn test_create_with_unknown_author_rolls_back() {
        let (pool, repo) = setup_test_repo().await;
        let alice = create_test_user(&pool, "alice").await;

        let mut bad = input("T", alice);
        bad.author_ids = vec![404];

        assert!(repo.create(&bad).await.is_err());
        assert_eq!(repo.count(&ArticleFilter::default()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_partial_update_leaves_membership() {
        let (pool, repo) = setup_test_repo().await;
        let alice = create_test_user(&pool, "alice").await;
        let tag = create_test_tag(&pool, "t").await;

        let mut tagged = input("T", alice);
        tagged.tag_ids = vec![tag];
        let article = repo.create(&tagged).await.unwrap();

        let update = UpdateArticleInput {
            title: Some("New".to_string()),
            ..Default::default()
        };
        let updated = repo.update(article.id, &update).await.unwrap();

        assert_eq!(updated.title, "New");
        assert_eq!(updated.abstract_text, "Abstract");
        assert_eq!(updated.authors, vec![alice]);
        assert_eq!(updated.tags.len(), 1);
    }

    #[tokio::test]
    async fn test_update_replaces_membership_sets() {
        let (pool, repo) = setup_test_repo().await;
        let alice = create_test_user(&pool, "alice").await;
        let bob = create_test_user(&pool, "bob").await;
        let a = create_test_tag(&pool, "a").await;
        let b = create_test_tag(&pool, "b").await;

        let mut tagged = input("T", alice);
        tagged.tag_ids = vec![a];
        let article = repo.create(&tagged).await.unwrap();

        let update = UpdateArticleInput {
            author_ids: Some(vec![bob]),
            tag_ids: Some(vec![b]),
            ..Default::default()
        };
        let updated = repo.update(article.id, &update).await.unwrap();

        assert_eq!(updated.authors, vec![bob]);
        assert_eq!(updated.tags.iter().map(|t| t.id).collect::<Vec<_>>(), vec![b]);

        let cleared = repo
            .update(
                article.id,
                &UpdateArticleInput {
                    tag_ids: Some(vec![]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(cleared.tags.is_empty());
    }

    #[tokio::test]
    async fn test_failed_update_is_atomic() {
        let (pool, repo) = setup_test_repo().await;
        let alice = create_test_user(&pool, "alice").await;
        let article = repo.create(&input("Original", alice)).await.unwrap();

        let update = UpdateArticleInput {
            title: Some("Changed".to_string()),
            author_ids: Some(vec![999]),
            ..Default::default()
        };
        assert!(repo.update(article.id, &update).await.is_err());

        let unchanged = repo.get_by_id(article.id).await.unwrap().unwrap();
        assert_eq!(unchanged.title, "Original");
        assert_eq!(unchanged.authors, vec![alice]);
    }

    #[tokio::test]
    async fn test_add_author_is_idempotent() {
        let (pool, repo) = setup_test_repo().await;
        let alice = create_test_user(&pool, "alice").await;
        let bob = create_test_user(&pool, "bob").await;
        let article = repo.create(&input("T", alice)).await.unwrap();

        repo.add_author(article.id, bob).await.unwrap();
        repo.add_author(article.id, bob).await.unwrap();
        repo.add_author(article.id, alice).await.unwrap();

        let article = repo.get_by_id(article.id).await.unwrap().unwrap();
        assert_eq!(article.authors, vec![alice, bob]);
    }

    #[tokio::test]
    async fn test_delete_article() {
        let (pool, repo) = setup_test_repo().await;
        let alice = create_test_user(&pool, "alice").await;
        let article = repo.create(&input("T", alice)).await.unwrap();

        assert!(repo.exists(article.id).await.unwrap());
        repo.delete(article.id).await.unwrap();

        assert!(!repo.exists(article.id).await.unwrap());
        assert!(repo.get_by_id(article.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_filters_compose_conjunctively() {
        let (pool, repo) = setup_test_repo().await;
        let alice = create_test_user(&pool, "alice").await;
        let bob = create_test_user(&pool, "bob").await;
        let news = create_test_tag(&pool, "news").await;

        let mut first = input("Rust Weekly", alice);
        first.tag_ids = vec![news];
        let first = repo.create(&first).await.unwrap();

        let mut second = input("Gardening", bob);
        second.publication_date = date(2024, 6, 1);
        second.main_text = "rust on tools".to_string();
        let second = repo.create(&second).await.unwrap();

        let third = repo.create(&input("Cooking", bob)).await.unwrap();

        let ids = |articles: Vec<Article>| articles.into_iter().map(|a| a.id).collect::<Vec<_>>();

        let by_date = ArticleFilter {
            publication_date: Some(date(2025, 1, 1)),
            ..Default::default()
        };
        assert_eq!(ids(repo.list(&by_date, 0, 10).await.unwrap()), vec![first.id, third.id]);

        let by_author = ArticleFilter {
            author: Some(bob),
            ..Default::default()
        };
        assert_eq!(ids(repo.list(&by_author, 0, 10).await.unwrap()), vec![second.id, third.id]);

        let by_tag = ArticleFilter {
            tag: Some(news),
            ..Default::default()
        };
        assert_eq!(ids(repo.list(&by_tag, 0, 10).await.unwrap()), vec![first.id]);

        let search = ArticleFilter {
            search: Some("RUST".to_string()),
            ..Default::default()
        };
        assert_eq!(ids(repo.list(&search, 0, 10).await.unwrap()), vec![first.id, second.id]);
        assert_eq!(repo.count(&search).await.unwrap(), 2);

        let combined = ArticleFilter {
            search: Some("rust".to_string()),
            author: Some(bob),
            ..Default::default()
        };
        assert_eq!(ids(repo.list(&combined, 0, 10).await.unwrap()), vec![second.id]);

        let nobody = ArticleFilter {
            author: Some(999),
            ..Default::default()
        };
        assert!(repo.list(&nobody, 0, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_paginates_by_id() {
        let (pool, repo) = setup_test_repo().await;
        let alice = create_test_user(&pool, "alice").await;

        let mut created = Vec::new();
        for i in 0..5 {
            created.push(repo.create(&input(&format!("A{}", i), alice)).await.unwrap().id);
        }

        let all = ArticleFilter::default();
        let page2: Vec<i64> = repo.list(&all, 2, 2).await.unwrap().iter().map(|a| a.id).collect();
        assert_eq!(page2, created[2..4].to_vec());
        assert!(repo.list(&all, 10, 2).await.unwrap().is_empty());
        assert_eq!(repo.count(&all).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_search_treats_wildcards_literally() {
        let (pool, repo) = setup_test_repo().await;
        let alice = create_test_user(&pool, "alice").await;

        let percent = repo.create(&input("100% done", alice)).await.unwrap();
        repo.create(&input("100 done", alice)).await.unwrap();

        let filter = ArticleFilter {
            search: Some("0%".to_string()),
            ..Default::default()
        };
        let found = repo.list(&filter, 0, 10).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, percent.id);
    }

    #[tokio::test]
    async fn test_search_matches_non_ascii_text() {
        let (pool, repo) = setup_test_repo().await;
        let alice = create_test_user(&pool, "alice").await;

        let elan = repo.create(&input("Élan vital", alice)).await.unwrap();
        repo.create(&input("Elan", alice)).await.unwrap();

        for term in ["Élan", "ÉLAN", "VITAL", "n vi"] {
            let filter = ArticleFilter {
                search: Some(term.to_string()),
                ..Default::default()
            };
            let found: Vec<i64> = repo.list(&filter, 0, 10).await.unwrap().iter().map(|a| a.id).collect();
            assert_eq!(found, vec![elan.id], "term {:?}", term);
        }
    }

    #[tokio::test]
    async fn test_export_rows_resolve_names() {
        let (pool, repo) = setup_test_repo().await;
        let alice = create_test_user(&pool, "alice").await;
        let bob = create_test_user(&pool, "bob").await;
        let x = create_test_tag(&pool, "x").await;

        let mut tagged = input("T", alice);
        tagged.author_ids = vec![bob];
        tagged.tag_ids = vec![x];
        let article = repo.create(&tagged).await.unwrap();
        repo.create(&input("Other", alice)).await.unwrap();

        let rows = repo.export_rows(&ArticleFilter::default()).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, article.id);
        assert_eq!(rows[0].authors, vec!["bob".to_string(), "alice".to_string()]);
        assert_eq!(rows[0].tags, vec!["x".to_string()]);

        let only = ArticleFilter {
            id: Some(article.id),
            ..Default::default()
        };
        assert_eq!(repo.export_rows(&only).await.unwrap().len(), 1);
    }

    #[test]
    fn test_filter_clause_empty() {
        let (clause, values) = filter_clause(&ArticleFilter::default());
        assert!(clause.is_empty());
        assert!(values.is_empty());
    }

    #[test]
    fn test_like_pattern_escapes() {
        assert_eq!(like_pattern("AbC"), "%AbC%");
        assert_eq!(like_pattern("50%_!"), "%50!%!_!!%");
    }

    fn filter_strategy() -> impl Strategy<Value = ArticleFilter> {
        (
            proptest::option::of(1i64..1000),
            proptest::option::of((2000i32..2030, 1u32..=12, 1u32..=28)),
            proptest::option::of(1i64..1000),
            proptest::option::of(1i64..1000),
            proptest::option::of("[a-zA-Z%_ ]{0,8}"),
        )
            .prop_map(|(id, date, author, tag, search)| ArticleFilter {
                id,
                publication_date: date.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
                author,
                tag,
                search,
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn filter_clause_placeholders_match_values(filter in filter_strategy()) {
            let (clause, values) = filter_clause(&filter);
            prop_assert_eq!(clause.matches('?').count(), values.len());

            let predicates = [
                filter.id.is_some(),
                filter.publication_date.is_some(),
                filter.author.is_some(),
                filter.tag.is_some(),
                filter.search.is_some(),
            ]
            .iter()
            .filter(|set| **set)
            .count();
            let ands = clause.matches(" AND ").count();
            prop_assert_eq!(ands, predicates.saturating_sub(1));
            prop_assert_eq!(clause.is_empty(), predicates == 0);
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        /// Search returns exactly the articles whose title, abstract or main
        /// text contains the term, ignoring ASCII case. Other letters, such as
        /// `é`, must match as written.
        #[test]
        fn search_matches_case_insensitive_substring(
            texts in proptest::collection::vec(("[a-cA-CéÉ]{0,6}", "[a-cA-CéÉ]{0,6}", "[a-cA-CéÉ]{0,6}"), 1..6),
            term in "[a-cA-CéÉ]{1,2}",
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let result: Result<(), TestCaseError> = rt.block_on(async {
                let (pool, repo) = setup_test_repo().await;
                let alice = create_test_user(&pool, "alice").await;

                let mut expected = Vec::new();
                for (title, abstract_text, main_text) in &texts {
                    let article = repo
                        .create(&CreateArticleInput {
                            title: title.clone(),
                            abstract_text: abstract_text.clone(),
                            main_text: main_text.clone(),
                            publication_date: date(2025, 1, 1),
                            creator_id: alice,
                            author_ids: Vec::new(),
                            tag_ids: Vec::new(),
                        })
                        .await
                        .unwrap();
                    let needle = term.to_ascii_lowercase();
                    if [title, abstract_text, main_text]
                        .iter()
                        .any(|field| field.to_ascii_lowercase().contains(&needle))
                    {
                        expected.push(article.id);
                    }
                }

                let filter = ArticleFilter {
                    search: Some(term.clone()),
                    ..Default::default()
                };
                let found: Vec<i64> = repo
                    .list(&filter, 0, 100)
                    .await
                    .unwrap()
                    .iter()
                    .map(|a| a.id)
                    .collect();

                prop_assert_eq!(found, expected);
                Ok(())
            });
            result?;
        }
    }
}
