//! Centralized error types for email-settings.

use thiserror::Error;

/// Failures raised by a [`Transport`](crate::transport::Transport)
/// implementation.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The HTTP client failed (connection, TLS, timeout, ...).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote service answered with a non-success status.
    #[error("Remote service returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body was not a flat JSON object.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The request URL could not be built from the configured base URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// All errors produced by the email-settings library.
#[derive(Error, Debug)]
pub enum Error {
    /// The transport call failed; carried through unmodified.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A fetch was performed but the response did not contain this key.
    #[error("Attribute not found: {0}")]
    AttributeNotFound(String),

    /// A typed accessor found a value of the wrong JSON type.
    #[error("Attribute '{name}' is not {expected}")]
    AttributeType {
        name: String,
        expected: &'static str,
    },
}

/// Convenience alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// `true` when the error came from the transport rather than the data.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    pub(crate) fn attribute_type(name: impl Into<String>, expected: &'static str) -> Self {
        Self::AttributeType {
            name: name.into(),
            expected,
        }
    }
}
