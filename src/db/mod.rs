//! Database layer
//!
//! Pressroom runs on SQLite by default and on MySQL for larger deployments.
//! The driver is selected from configuration and hidden behind the
//! `DatabasePool` trait; repositories dispatch on `driver()` to the
//! backend-specific query functions.
//!
//! ```ignore
//! use pressroom::config::DatabaseConfig;
//! use pressroom::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
