use std::sync::Arc;

use thiserror::Error;

use crate::client::FetchError;
use crate::config::LoadError;

/// Top-level failure of the `wpqc` binary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] LoadError),
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
    #[error("unknown resource `{name}` (known: {known})")]
    UnknownResource { name: String, known: String },
    #[error("request failed: {0}")]
    Fetch(Arc<FetchError>),
    #[error("no record matches slug `{slug}`")]
    Missing { slug: String },
    #[error("request ended without a result")]
    Interrupted,
    #[error("failed to encode output: {0}")]
    Output(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }

    pub fn unknown_resource<'a>(name: &str, known: impl Iterator<Item = &'a str>) -> Self {
        Self::UnknownResource {
            name: name.to_string(),
            known: known.collect::<Vec<_>>().join(", "),
        }
    }
}

impl From<FetchError> for AppError {
    fn from(error: FetchError) -> Self {
        Self::Fetch(Arc::new(error))
    }
}

impl From<Arc<FetchError>> for AppError {
    fn from(error: Arc<FetchError>) -> Self {
        Self::Fetch(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_resource_lists_known_names() {
        let err = AppError::unknown_resource("venues", ["events", "users"].into_iter());
        assert_eq!(
            err.to_string(),
            "unknown resource `venues` (known: events, users)"
        );
    }

    #[test]
    fn fetch_errors_are_shared() {
        let shared = Arc::new(FetchError::not_found("acme"));
        let err = AppError::from(Arc::clone(&shared));
        assert!(matches!(err, AppError::Fetch(ref inner) if Arc::ptr_eq(inner, &shared)));
    }
}
