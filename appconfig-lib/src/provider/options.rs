//! Load and bind options

use std::sync::Arc;

use url::Url;

use crate::AppConfigClient;
use crate::ClientOptions;
use crate::api::NULL_LABEL;
use crate::api::SettingSelector;
use crate::auth::Credential;
use crate::error::BindError;
use crate::error::Error;

/// Key separators accepted by [`ConstructionOptions::separator`].
pub const SEPARATORS: [&str; 8] = [".", ",", ";", "-", "_", "__", "/", ":"];

/// Default key separator.
pub const DEFAULT_SEPARATOR: &str = ".";

// =============================================================================
// AuthenticationOptions
// =============================================================================

/// How [`load`](super::load) authenticates against the store.
#[derive(Clone)]
pub enum AuthenticationOptions {
    /// `Endpoint=…;Id=…;Secret=…` access key connection string.
    ConnectionString(String),
    /// Endpoint plus any [`Credential`] implementation.
    Credential {
        endpoint: Url,
        credential: Arc<dyn Credential>,
    },
}

impl AuthenticationOptions {
    /// Authenticates with a connection string.
    pub fn connection_string(connection_string: impl Into<String>) -> Self {
        Self::ConnectionString(connection_string.into())
    }

    /// Authenticates with an endpoint and credential.
    pub fn credential<C: Credential + 'static>(endpoint: Url, credential: C) -> Self {
        Self::Credential {
            endpoint,
            credential: Arc::new(credential),
        }
    }

    pub(crate) fn client(&self, options: ClientOptions) -> Result<AppConfigClient, Error> {
        match self {
            Self::ConnectionString(cs) => {
                AppConfigClient::from_connection_string_with_options(cs, options)
            }
            Self::Credential {
                endpoint,
                credential,
            } => AppConfigClient::builder()
                .endpoint(endpoint.clone())
                .shared_credential(credential.clone())
                .options(options)
                .build(),
        }
    }
}

impl std::fmt::Debug for AuthenticationOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConnectionString(_) => f.write_str("ConnectionString(<redacted>)"),
            Self::Credential { endpoint, .. } => f
                .debug_struct("Credential")
                .field("endpoint", &endpoint.as_str())
                .finish_non_exhaustive(),
        }
    }
}

// =============================================================================
// Options
// =============================================================================

/// Options for [`load`](super::load).
///
/// # Example
///
/// ```
/// use appconfig_lib::api::SettingSelector;
/// use appconfig_lib::provider::Options;
///
/// let options = Options::default()
///     .selector(SettingSelector::new("App:*"))
///     .selector(SettingSelector::new("App:*").label("prod"))
///     .trim_key_prefix("App:");
/// # let _ = options;
/// ```
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Selectors applied in order; later ones override earlier ones for
    /// equal keys. Empty means every key with the null label.
    pub selectors: Vec<SettingSelector>,
    /// Prefixes removed from loaded keys; the longest match wins.
    pub trim_key_prefixes: Vec<String>,
    /// Transport options for the underlying client.
    pub client: ClientOptions,
}

impl Options {
    /// Adds a selector.
    pub fn selector(mut self, selector: SettingSelector) -> Self {
        self.selectors.push(selector);
        self
    }

    /// Adds a key prefix to trim.
    pub fn trim_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.trim_key_prefixes.push(prefix.into());
        self
    }

    /// Sets the client transport options.
    pub fn client_options(mut self, options: ClientOptions) -> Self {
        self.client = options;
        self
    }

    /// Validated selectors to query, in override order.
    ///
    /// A missing or empty label filter means the null label. Label filters
    /// must name one exact label. Duplicates keep their last position.
    pub(crate) fn effective_selectors(&self) -> Result<Vec<SettingSelector>, Error> {
        if self.selectors.is_empty() {
            return Ok(vec![SettingSelector::all().null_label()]);
        }

        let mut selectors: Vec<SettingSelector> = Vec::with_capacity(self.selectors.len());
        for selector in &self.selectors {
            if selector.key_filter.is_empty() {
                return Err(Error::InvalidSelector(
                    "key filter cannot be empty".to_string(),
                ));
            }

            let label = match selector.label_filter.as_deref() {
                None | Some("") => NULL_LABEL.to_string(),
                Some(label) if label.contains(['*', ',']) => {
                    return Err(Error::InvalidSelector(format!(
                        "label filter '{}' cannot contain '*' or ','",
                        label
                    )));
                }
                Some(label) => label.to_string(),
            };

            let selector = SettingSelector::new(selector.key_filter.clone()).label(label);
            selectors.retain(|s| *s != selector);
            selectors.push(selector);
        }

        Ok(selectors)
    }

    /// Removes the longest matching trim prefix from `key`.
    pub(crate) fn trim_key<'k>(&self, key: &'k str) -> &'k str {
        self.trim_key_prefixes
            .iter()
            .filter(|prefix| !prefix.is_empty() && key.starts_with(prefix.as_str()))
            .max_by_key(|prefix| prefix.len())
            .map_or(key, |prefix| &key[prefix.len()..])
    }
}

// =============================================================================
// ConstructionOptions
// =============================================================================

/// How field names are matched against setting keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CasePolicy {
    /// `testkey` binds to a field named `TestKey`; an exact match wins over
    /// a case-insensitive one.
    #[default]
    Insensitive,
    /// Only exact names bind.
    Sensitive,
}

/// Options for [`unmarshal`](super::AzureAppConfiguration::unmarshal) and
/// [`get_bytes`](super::AzureAppConfiguration::get_bytes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstructionOptions {
    /// Separator splitting keys into nested sections.
    pub separator: String,
    /// Field name matching policy.
    pub case_policy: CasePolicy,
}

impl Default for ConstructionOptions {
    fn default() -> Self {
        Self {
            separator: DEFAULT_SEPARATOR.to_string(),
            case_policy: CasePolicy::default(),
        }
    }
}

impl ConstructionOptions {
    /// Sets the key separator.
    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Sets the field name matching policy.
    pub fn case_policy(mut self, policy: CasePolicy) -> Self {
        self.case_policy = policy;
        self
    }

    /// Checks that the separator is supported.
    pub fn validate(&self) -> Result<(), BindError> {
        if SEPARATORS.contains(&self.separator.as_str()) {
            Ok(())
        } else {
            Err(BindError::InvalidSeparator(self.separator.clone()))
        }
    }
}
