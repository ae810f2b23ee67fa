//! Credential trait and bearer tokens

use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::AUTHORIZATION;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderValue;
use url::Url;

use crate::error::AuthError;

/// Trait for authorizing requests sent to the configuration store.
///
/// The client calls `authorize` once per attempt (retries are re-signed) with
/// the final method, URL and body, and merges the returned headers into the
/// request.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use appconfig_lib::auth::Credential;
/// use appconfig_lib::error::AuthError;
///
/// struct Anonymous;
///
/// #[async_trait]
/// impl Credential for Anonymous {
///     async fn authorize(&self, _: &Method, _: &Url, _: &[u8]) -> Result<HeaderMap, AuthError> {
///         Ok(HeaderMap::new())
///     }
/// }
/// ```
#[async_trait]
pub trait Credential: Send + Sync {
    /// Returns the headers that authorize this request.
    async fn authorize(
        &self,
        method: &Method,
        url: &Url,
        body: &[u8],
    ) -> Result<HeaderMap, AuthError>;
}

/// A credential that always sends the same bearer token.
///
/// Useful when a token was obtained out of band, e.g. from an identity
/// provider, and does not need refresh logic.
///
/// # Example
///
/// ```
/// use appconfig_lib::auth::StaticTokenCredential;
///
/// let credential = StaticTokenCredential::new("my-access-token");
/// ```
#[derive(Clone)]
pub struct StaticTokenCredential {
    token: String,
}

impl StaticTokenCredential {
    /// Creates a new static bearer credential.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for StaticTokenCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenCredential")
            .field("token", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl Credential for StaticTokenCredential {
    async fn authorize(
        &self,
        _method: &Method,
        _url: &Url,
        _body: &[u8],
    ) -> Result<HeaderMap, AuthError> {
        let value = HeaderValue::from_str(&format!("Bearer {}", self.token))
            .map_err(|e| AuthError::InvalidHeader(e.to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, value);
        Ok(headers)
    }
}
