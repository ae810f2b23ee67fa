//! Error types

mod api;
mod auth;
mod bind;
mod problem;

use std::time::Duration;

pub use api::*;
pub use auth::*;
pub use bind::*;
pub use problem::*;

/// Top-level error returned by client and provider operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The service rejected the request or could not be reached.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// The credential could not be parsed or applied to a request.
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// A loaded snapshot could not be projected onto the target type.
    #[error("Bind error: {0}")]
    Bind(#[from] BindError),

    /// A key or label selector is not usable for the requested operation.
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    /// The service kept answering 429 after all retries were spent.
    #[error("Rate limited{}", retry_after.map(|d| format!(", retry after {:?}", d)).unwrap_or_default())]
    RateLimit {
        /// Delay suggested by the service, if any.
        retry_after: Option<Duration>,
    },

    /// The client's cancellation token fired before the request completed.
    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    /// Returns the HTTP status code when the error came from a service response.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api(api) => api.status_code(),
            Self::RateLimit { .. } => Some(429),
            _ => None,
        }
    }

    /// Returns `true` when the service answered 404.
    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }
}
