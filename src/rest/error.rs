//! Error types for the API gateway.

use thiserror::Error;

/// Errors that can occur when issuing an API request.
///
/// Non-2xx HTTP responses are deliberately absent: the service signals some
/// failures via status codes and others in the response body, so completed
/// exchanges are always returned as an envelope for the caller to interpret.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network-level failure (DNS resolution, connection refused, timeout,
    /// TLS errors). No response was received, so the cookie jar was not
    /// updated.
    #[error("transport error calling {url}: {source}")]
    Transport {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// The base URL or the assembled endpoint URL is not valid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// HTTP client construction failed.
    #[error("failed to build HTTP client: {source}")]
    ClientBuild {
        /// The underlying builder error.
        #[source]
        source: reqwest::Error,
    },

    /// Request content could not be serialized to JSON.
    #[error("failed to serialize request body: {0}")]
    Serialize(#[from] serde_json::Error),
}
