//! Configuration provider
//!
//! Two-phase access to a configuration store: [`load`] fetches every setting
//! matched by the selectors into an in-memory [`Snapshot`], then
//! [`AzureAppConfiguration::unmarshal`] binds that snapshot onto a typed
//! record without further network calls.
//!
//! ```no_run
//! use appconfig_lib::provider::{self, AuthenticationOptions, Options};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Config {
//!     #[serde(rename = "TestKey", default)]
//!     test_key: String,
//! }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let auth = AuthenticationOptions::connection_string("Endpoint=…;Id=…;Secret=…");
//! let config = provider::load(auth, Options::default()).await?;
//! let typed: Config = config.unmarshal(None)?;
//! println!("{}", typed.test_key);
//! # Ok(())
//! # }
//! ```

mod de;
mod options;
mod snapshot;
mod tree;

pub use options::*;
pub use snapshot::*;

use serde::de::DeserializeOwned;

use crate::AppConfigClient;
use crate::error::BindError;
use crate::error::Error;

/// Loads every setting matched by `options` into a new provider.
///
/// Feature flags are skipped. An empty store yields an empty snapshot.
pub async fn load(
    auth: AuthenticationOptions,
    options: Options,
) -> Result<AzureAppConfiguration, Error> {
    options.effective_selectors()?;
    let client = auth.client(options.client.clone())?;
    let snapshot = load_snapshot(&client, &options).await?;

    Ok(AzureAppConfiguration {
        client,
        options,
        snapshot,
    })
}

/// Settings loaded from a configuration store.
#[derive(Debug, Clone)]
pub struct AzureAppConfiguration {
    client: AppConfigClient,
    options: Options,
    snapshot: Snapshot,
}

impl AzureAppConfiguration {
    /// Re-runs the load with the original options.
    ///
    /// The snapshot is only replaced when the whole load succeeds.
    pub async fn refresh(&mut self) -> Result<(), Error> {
        self.snapshot = load_snapshot(&self.client, &self.options).await?;
        Ok(())
    }

    /// Returns the value of a loaded key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.snapshot.get(key)
    }

    /// Iterates over loaded keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.snapshot.keys()
    }

    /// Returns the loaded snapshot.
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Returns the client used for loading.
    pub fn client(&self) -> &AppConfigClient {
        &self.client
    }

    /// Binds the snapshot onto `T`.
    ///
    /// Keys are split into sections on the separator (default `.`). Fields
    /// with a serde default, and `Option` fields, keep their zero value when
    /// absent; other absent fields fail with [`BindError::MissingField`].
    pub fn unmarshal<T: DeserializeOwned>(
        &self,
        options: Option<&ConstructionOptions>,
    ) -> Result<T, BindError> {
        unmarshal(&self.snapshot, options)
    }

    /// Returns the sectioned settings tree as JSON.
    pub fn get_bytes(&self, options: Option<&ConstructionOptions>) -> Result<Vec<u8>, BindError> {
        let options = options.cloned().unwrap_or_default();
        options.validate()?;

        let tree = tree::build(&self.snapshot, &options.separator);
        serde_json::to_vec(&tree).map_err(|e| BindError::Encode(e.to_string()))
    }
}

/// Binds any snapshot onto `T`.
pub fn unmarshal<T: DeserializeOwned>(
    snapshot: &Snapshot,
    options: Option<&ConstructionOptions>,
) -> Result<T, BindError> {
    let options = options.cloned().unwrap_or_default();
    options.validate()?;

    let tree = tree::build(snapshot, &options.separator);
    T::deserialize(de::ValueDeserializer::new(tree, options.case_policy))
}

async fn load_snapshot(client: &AppConfigClient, options: &Options) -> Result<Snapshot, Error> {
    let mut snapshot = Snapshot::new();

    for selector in options.effective_selectors()? {
        log::debug!(
            "Loading settings with key filter '{}' and label filter {:?}",
            selector.key_filter,
            selector.label_filter
        );

        let settings = client.list_settings(selector).collect_all().await?;
        for setting in settings {
            if setting.is_feature_flag() {
                continue;
            }

            let key = options.trim_key(&setting.key);
            if key.is_empty() {
                log::debug!("Skipping '{}', nothing left after trimming", setting.key);
                continue;
            }

            let key = key.to_string();
            snapshot.insert(key, setting.into());
        }
    }

    log::info!("Loaded {} settings from {}", snapshot.len(), client.endpoint());
    Ok(snapshot)
}
