use std::path::PathBuf;

use thiserror::Error;

use crate::provider::ProviderKind;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("No provider is configured")]
    NoProvider,

    #[error("Configuration for {0} is incomplete")]
    IncompleteConfig(ProviderKind),

    #[error("An output for {0} already exists")]
    DuplicateSink(PathBuf),

    #[error("No output is configured for {0}")]
    UnknownSink(PathBuf),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a single provider round-trip.
///
/// `Transient` covers problems that are expected to heal on their own
/// (player not running, network blip, expired token). `Permanent` covers
/// responses the adapter cannot make sense of.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{operation}: provider unreachable: {message}")]
    Transient {
        operation: &'static str,
        message: String,
    },

    #[error("{operation}: {message}")]
    Permanent {
        operation: &'static str,
        message: String,
    },
}

impl ProviderError {
    pub fn transient(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Transient {
            operation,
            message: message.into(),
        }
    }

    pub fn permanent(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Permanent {
            operation,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    pub fn operation(&self) -> &'static str {
        match self {
            Self::Transient { operation, .. } | Self::Permanent { operation, .. } => operation,
        }
    }
}

/// Failure writing one output destination.
#[derive(Debug, Error)]
#[error("Failed to write {}: {source}", path.display())]
pub struct SinkError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Client id and secret are required")]
    MissingClientCredentials,

    #[error("Token request failed: {0}")]
    Http(String),

    #[error("Token request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Callback listener failed: {0}")]
    Listener(String),

    #[error("Failed to open browser: {0}")]
    Browser(String),

    #[error("Authorization was not completed within {0:?}")]
    Timeout(std::time::Duration),

    #[error("Authorization callback did not contain a code")]
    MissingCode,

    #[error("No refresh token available")]
    NoRefreshToken,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_classification() {
        let err = ProviderError::transient("fetch", "connection refused");
        assert!(err.is_transient());
        assert_eq!(err.operation(), "fetch");
        assert_eq!(
            err.to_string(),
            "fetch: provider unreachable: connection refused"
        );

        let err = ProviderError::permanent("fetch", "unknown state 'buffering'");
        assert!(!err.is_transient());
        assert_eq!(err.to_string(), "fetch: unknown state 'buffering'");
    }

    #[test]
    fn test_sink_error_message() {
        let err = SinkError {
            path: PathBuf::from("/tmp/missing/out.txt"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such directory"),
        };
        assert!(err.to_string().contains("/tmp/missing/out.txt"));
    }
}
