//! Common API utilities and shared types
//!
//! Query values arrive as strings and are parsed here, so a bad value turns
//! into a 400 naming the offending parameter.

use serde::Serialize;
use std::str::FromStr;

use crate::api::middleware::ApiError;
use crate::config::PaginationConfig;
use crate::models::{ListParams, PagedResult};
use crate::services::FieldError;

/// List response envelope shared by every collection endpoint
#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    /// Total number of matching items across all pages
    pub count: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
    pub results: Vec<T>,
}

impl<T> From<PagedResult<T>> for ListResponse<T> {
    fn from(paged: PagedResult<T>) -> Self {
        let total_pages = paged.total_pages();
        Self {
            count: paged.total,
            page: paged.page,
            page_size: paged.per_page,
            total_pages,
            results: paged.items,
        }
    }
}

/// Parse an optional query parameter
pub fn parse_param<T: FromStr>(name: &str, value: Option<&str>) -> Result<Option<T>, ApiError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw.parse::<T>().map(Some).map_err(|_| {
            ApiError::field(FieldError::new(name, format!("Invalid value: \"{}\"", raw)))
        }),
    }
}

/// Build pagination from `page` / `page_size`, falling back to configured defaults
pub fn list_params(
    page: Option<&str>,
    page_size: Option<&str>,
    config: &PaginationConfig,
) -> Result<ListParams, ApiError> {
    let page = positive_param("page", page)?.unwrap_or(1);
    let page_size = positive_param("page_size", page_size)?.unwrap_or(config.page_size);
    Ok(ListParams::new(page, page_size, config.max_page_size))
}

fn positive_param(name: &str, value: Option<&str>) -> Result<Option<u32>, ApiError> {
    match parse_param::<u32>(name, value)? {
        Some(0) => Err(ApiError::field(FieldError::new(
            name,
            "Ensure this value is greater than or equal to 1.",
        ))),
        other => Ok(other),
    }
}
