//! Shared HTTP plumbing for provider adapters.

use std::time::Duration;

use serde::de::DeserializeOwned;
use ureq::Body;
use ureq::http::Response;

use crate::error::ProviderError;

/// Agent with a global timeout so a hung provider cannot wedge a tick.
///
/// Status codes are returned to the caller instead of being mapped to
/// errors: each adapter decides which statuses are transient.
pub(crate) fn agent(timeout: Duration) -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build();
    config.into()
}

/// Map a transport-level failure to a provider error.
///
/// Anything that looks like "nobody is listening" or "network is down"
/// is transient.
pub(crate) fn transport_error(operation: &'static str, err: ureq::Error) -> ProviderError {
    match err {
        ureq::Error::Io(_)
        | ureq::Error::Timeout(_)
        | ureq::Error::HostNotFound
        | ureq::Error::ConnectionFailed => ProviderError::transient(operation, err.to_string()),
        other => ProviderError::permanent(operation, other.to_string()),
    }
}

/// Read the whole response body as text
pub(crate) fn read_body(
    operation: &'static str,
    response: &mut Response<Body>,
) -> Result<String, ProviderError> {
    response
        .body_mut()
        .read_to_string()
        .map_err(|e| transport_error(operation, e))
}

/// Parse a JSON body, reporting malformed documents as permanent errors
pub(crate) fn parse_json<T: DeserializeOwned>(
    operation: &'static str,
    body: &str,
) -> Result<T, ProviderError> {
    serde_json::from_str(body)
        .map_err(|e| ProviderError::permanent(operation, format!("malformed response: {}", e)))
}

/// Shorten a response body for log and error messages
pub(crate) fn excerpt(body: &str) -> String {
    const MAX: usize = 200;
    let trimmed = body.trim();
    if trimmed.chars().count() > MAX {
        let cut: String = trimmed.chars().take(MAX).collect();
        format!("{}...", cut)
    } else {
        trimmed.to_string()
    }
}
