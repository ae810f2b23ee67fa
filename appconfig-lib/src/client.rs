//! Main AppConfigClient

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::ConnectionString;
use crate::auth::Credential;
use crate::error::ApiError;
use crate::error::Error;
use crate::retry::RetryConfig;

/// Default data-plane API version.
pub const DEFAULT_API_VERSION: &str = "1.0";

/// Client for the App Configuration key-value REST API.
///
/// This client is cheap to clone (uses `Arc` internally) and can be shared
/// across threads safely.
///
/// # Example
///
/// ```no_run
/// use appconfig_lib::AppConfigClient;
/// use appconfig_lib::model::ConfigurationSetting;
///
/// # async fn run() -> Result<(), appconfig_lib::error::Error> {
/// let client = AppConfigClient::from_connection_string(
///     "Endpoint=http://localhost:8483;Id=emulator;Secret=c2VjcmV0",
/// )?;
///
/// client
///     .set_setting(ConfigurationSetting::new("TestKey", "testvalue"))
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AppConfigClient {
    pub(crate) inner: Arc<AppConfigClientInner>,
}

pub(crate) struct AppConfigClientInner {
    pub(crate) endpoint: Url,
    pub(crate) credential: Arc<dyn Credential>,
    pub(crate) http_client: Client,
    pub(crate) options: ClientOptions,
}

impl AppConfigClient {
    /// Creates a new builder for constructing a client.
    pub fn builder() -> AppConfigClientBuilder<Missing, Missing> {
        AppConfigClientBuilder::new()
    }

    /// Creates a client from an `Endpoint=…;Id=…;Secret=…` connection string.
    ///
    /// Only parses the credential; no request is sent until the first
    /// operation.
    pub fn from_connection_string(connection_string: &str) -> Result<Self, Error> {
        Self::from_connection_string_with_options(connection_string, ClientOptions::default())
    }

    /// Like [`from_connection_string`](Self::from_connection_string), with
    /// explicit client options.
    pub fn from_connection_string_with_options(
        connection_string: &str,
        options: ClientOptions,
    ) -> Result<Self, Error> {
        let parsed = ConnectionString::parse(connection_string)?;

        Self::builder()
            .endpoint(parsed.endpoint().clone())
            .credential(parsed.credential())
            .options(options)
            .build()
    }

    /// Returns the store endpoint.
    pub fn endpoint(&self) -> &Url {
        &self.inner.endpoint
    }

    /// Returns the API version being used.
    pub fn api_version(&self) -> &str {
        &self.inner.options.api_version
    }

    /// Returns the token that cancels this client's requests.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.inner.options.cancellation_token
    }
}

impl std::fmt::Debug for AppConfigClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfigClient")
            .field("endpoint", &self.inner.endpoint.as_str())
            .field("api_version", &self.inner.options.api_version)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Options
// =============================================================================

/// Transport options shared by every request of a client.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// `api-version` query parameter.
    pub api_version: String,
    /// Per-request timeout.
    pub timeout: Option<Duration>,
    /// Connection timeout, applied when building the HTTP client.
    pub connect_timeout: Option<Duration>,
    /// Retry behavior for throttling, server and network errors.
    pub retry: RetryConfig,
    /// Cancels in-flight requests and backoff sleeps.
    pub cancellation_token: CancellationToken,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout: None,
            connect_timeout: None,
            retry: RetryConfig::default(),
            cancellation_token: CancellationToken::new(),
        }
    }
}

// =============================================================================
// Typestate Builder
// =============================================================================

/// Marker type for missing required builder fields.
pub struct Missing;

/// Marker type for set builder fields.
pub struct Set<T>(T);

/// Builder for constructing an [`AppConfigClient`].
///
/// Uses the typestate pattern to ensure required fields are set at compile time.
///
/// # Required Fields
///
/// - `endpoint` - The configuration store URL
/// - `credential` - A [`Credential`] implementation
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use appconfig_lib::AppConfigClient;
/// use appconfig_lib::auth::StaticTokenCredential;
///
/// let client = AppConfigClient::builder()
///     .endpoint("https://contoso.azconfig.io".parse().unwrap())
///     .credential(StaticTokenCredential::new("token"))
///     .api_version("2023-11-01")
///     .timeout(Duration::from_secs(30))
///     .build()
///     .unwrap();
///
/// assert_eq!(client.api_version(), "2023-11-01");
/// ```
pub struct AppConfigClientBuilder<E, C> {
    endpoint: E,
    credential: C,
    options: ClientOptions,
    http_client: Option<Client>,
}

impl AppConfigClientBuilder<Missing, Missing> {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            endpoint: Missing,
            credential: Missing,
            options: ClientOptions::default(),
            http_client: None,
        }
    }
}

impl Default for AppConfigClientBuilder<Missing, Missing> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> AppConfigClientBuilder<Missing, C> {
    /// Sets the configuration store endpoint.
    pub fn endpoint(self, endpoint: Url) -> AppConfigClientBuilder<Set<Url>, C> {
        AppConfigClientBuilder {
            endpoint: Set(endpoint),
            credential: self.credential,
            options: self.options,
            http_client: self.http_client,
        }
    }
}

impl<E> AppConfigClientBuilder<E, Missing> {
    /// Sets the credential used to sign requests.
    pub fn credential<T: Credential + 'static>(
        self,
        credential: T,
    ) -> AppConfigClientBuilder<E, Set<Arc<dyn Credential>>> {
        self.shared_credential(Arc::new(credential))
    }

    /// Sets an already shared credential.
    pub fn shared_credential(
        self,
        credential: Arc<dyn Credential>,
    ) -> AppConfigClientBuilder<E, Set<Arc<dyn Credential>>> {
        AppConfigClientBuilder {
            endpoint: self.endpoint,
            credential: Set(credential),
            options: self.options,
            http_client: self.http_client,
        }
    }
}

impl<E, C> AppConfigClientBuilder<E, C> {
    /// Replaces all transport options at once.
    pub fn options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the API version to use.
    ///
    /// Defaults to `1.0`.
    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.options.api_version = version.into();
        self
    }

    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    /// Sets the connection timeout.
    ///
    /// This is applied when building the HTTP client.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.options.connect_timeout = Some(timeout);
        self
    }

    /// Sets the retry configuration.
    pub fn retry_config(mut self, config: RetryConfig) -> Self {
        self.options.retry = config;
        self
    }

    /// Sets the token that cancels this client's requests.
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.options.cancellation_token = token;
        self
    }

    /// Sets a custom HTTP client.
    ///
    /// If not set, a default client will be created.
    pub fn http_client(mut self, client: Client) -> Self {
        self.http_client = Some(client);
        self
    }
}

impl AppConfigClientBuilder<Set<Url>, Set<Arc<dyn Credential>>> {
    /// Builds the [`AppConfigClient`].
    ///
    /// This method is only available when both `endpoint` and `credential` have been set.
    pub fn build(self) -> Result<AppConfigClient, Error> {
        let endpoint = self.endpoint.0;
        if endpoint.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(endpoint.to_string()).into());
        }

        let http_client = match self.http_client {
            Some(client) => client,
            None => {
                let mut builder = Client::builder();
                if let Some(timeout) = self.options.connect_timeout {
                    builder = builder.connect_timeout(timeout);
                }
                builder.build().map_err(ApiError::from)?
            }
        };

        Ok(AppConfigClient {
            inner: Arc::new(AppConfigClientInner {
                endpoint,
                credential: self.credential.0,
                http_client,
                options: self.options,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthError;

    #[test]
    fn test_from_connection_string() {
        let client = AppConfigClient::from_connection_string(
            "Endpoint=http://localhost:8483;Id=emulator;Secret=c2VjcmV0",
        )
        .unwrap();

        assert_eq!(client.endpoint().as_str(), "http://localhost:8483/");
        assert_eq!(client.api_version(), DEFAULT_API_VERSION);
        assert!(!client.cancellation_token().is_cancelled());
    }

    #[test]
    fn test_from_connection_string_rejects_malformed() {
        let err = AppConfigClient::from_connection_string("").unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::EmptyConnectionString)));

        let err = AppConfigClient::from_connection_string("Endpoint=http://x;Id=a").unwrap_err();
        assert!(matches!(
            err,
            Error::Auth(AuthError::MissingField { field: "Secret" })
        ));
    }

    #[test]
    fn test_options_are_applied() {
        let token = CancellationToken::new();
        let options = ClientOptions {
            api_version: "2023-10-01".to_string(),
            timeout: Some(Duration::from_secs(5)),
            cancellation_token: token.clone(),
            ..Default::default()
        };

        let client = AppConfigClient::from_connection_string_with_options(
            "Endpoint=https://contoso.azconfig.io;Id=a;Secret=c2VjcmV0",
            options,
        )
        .unwrap();

        assert_eq!(client.api_version(), "2023-10-01");
        token.cancel();
        assert!(client.cancellation_token().is_cancelled());
    }

    #[test]
    fn test_debug_hides_credential() {
        let client = AppConfigClient::from_connection_string(
            "Endpoint=https://contoso.azconfig.io;Id=a;Secret=c2VjcmV0",
        )
        .unwrap();
        let debug = format!("{:?}", client);
        assert!(debug.contains("contoso.azconfig.io"));
        assert!(!debug.contains("c2VjcmV0"));
    }
}
