//! Pressroom - a small publishing backend
//!
//! Articles with multiple authors and tags, comments, filtering, search and
//! CSV export, served as a JSON API over HTTP.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
