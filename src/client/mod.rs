//! Fetch capability consumed by the request orchestrator.

mod http;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::cache::Query;
use crate::record::PageCount;

pub use http::{TOTAL_PAGES_HEADER, WpClient, query_pairs};

/// Any failure while fetching from the backend.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server error: status {status} body {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode response: {message}")]
    Decode { message: String },
    #[error("record is missing the `{field}` field")]
    MissingField { field: String },
    #[error("no record matches slug `{slug}`")]
    NotFound { slug: String },
}

impl FetchError {
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    pub fn not_found(slug: impl Into<String>) -> Self {
        Self::NotFound { slug: slug.into() }
    }
}

/// Read access to a REST collection endpoint.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// GET `path` with `query`, returning the decoded JSON array.
    async fn get(&self, path: &str, query: &Query) -> Result<Vec<Value>, FetchError>;

    /// HEAD `path` with `query`, returning the advertised page count.
    async fn total_pages(&self, path: &str, query: &Query) -> Result<PageCount, FetchError>;
}
