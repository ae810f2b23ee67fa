//! Authentication error types

/// Errors raised while parsing a credential or signing a request.
///
/// All of these happen locally, before anything is sent to the store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The connection string was empty or only whitespace.
    #[error("Connection string is empty")]
    EmptyConnectionString,

    /// A `;`-separated segment had no `name=value` shape.
    #[error("Malformed connection string segment: '{segment}'")]
    MalformedSegment { segment: String },

    /// A required connection string field was absent or empty.
    #[error("Connection string is missing required field '{field}'")]
    MissingField { field: &'static str },

    /// The endpoint is not an absolute http(s) URL.
    #[error("Invalid endpoint '{endpoint}': {message}")]
    InvalidEndpoint { endpoint: String, message: String },

    /// The access key secret is not valid base64.
    #[error("Invalid secret: {0}")]
    InvalidSecret(String),

    /// A computed authentication header could not be encoded.
    #[error("Invalid authentication header: {0}")]
    InvalidHeader(String),
}
