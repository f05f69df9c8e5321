//! Envelope and paging types shared by the management endpoints

use pressone_core::traits::{PaginatedResponse, PaginationMeta};
use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

/// `{"data": ..., "message": ...}` envelope for single-object replies
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            data,
            message: None,
        }
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            message: Some(message.into()),
        }
    }
}

/// `?page=&per_page=` for call, campaign and payment listings
///
/// Dashboards send both as strings, so either form is accepted.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PaginationParams {
    /// 1-indexed
    #[serde(default = "first_page", deserialize_with = "lenient_i64")]
    #[validate(range(min = 1))]
    pub page: i64,

    #[serde(default = "default_page_size", deserialize_with = "lenient_i64")]
    #[validate(range(min = 1, max = 500))]
    pub per_page: i64,
}

fn lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Lenient {
        Number(i64),
        Text(String),
    }

    match Lenient::deserialize(deserializer)? {
        Lenient::Number(n) => Ok(n),
        Lenient::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

fn first_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    50
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: first_page(),
            per_page: default_page_size(),
        }
    }
}

impl PaginationParams {
    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.per_page
    }

    pub fn limit(&self) -> i64 {
        self.per_page
    }

    /// Wrap one page of rows with its paging metadata
    pub fn paginate<T>(&self, data: Vec<T>, total: i64) -> PaginatedResponse<T> {
        PaginatedResponse {
            data,
            pagination: PaginationMeta::new(total, self.page, self.per_page),
        }
    }
}
