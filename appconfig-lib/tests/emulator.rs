//! Integration tests against a running App Configuration emulator.
//!
//! These tests require a live emulator and are ignored by default.
//! To run them, start the emulator and create a `.env` file in the
//! appconfig-lib directory with:
//!
//! ```env
//! APP_CONFIGURATION_EMULATOR_CONNECTION_STRING=Endpoint=http://localhost:8483;Id=emulator;Secret=...
//! ```
//!
//! Then run: `cargo test -p appconfig-lib -- --ignored`

use std::env;

use appconfig_lib::AppConfigClient;
use appconfig_lib::api::SettingSelector;
use appconfig_lib::model::ConfigurationSetting;
use appconfig_lib::provider;
use appconfig_lib::provider::AuthenticationOptions;
use appconfig_lib::provider::Options;
use serde::Deserialize;

fn load_env() -> Option<String> {
    let _ = dotenvy::dotenv();
    env::var("APP_CONFIGURATION_EMULATOR_CONNECTION_STRING")
        .ok()
        .filter(|cs| !cs.is_empty())
}

#[tokio::test]
#[ignore = "requires a running emulator and .env file"]
async fn test_set_and_get() {
    let cs = load_env().expect("Missing APP_CONFIGURATION_EMULATOR_CONNECTION_STRING. See module docs.");
    let client = AppConfigClient::from_connection_string(&cs).unwrap();

    let stored = client
        .set_setting(ConfigurationSetting::new("appconfig-lib.test", "value"))
        .await
        .unwrap();
    assert!(stored.etag.is_some());

    let fetched = client
        .get_setting("appconfig-lib.test", None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.value.as_deref(), Some("value"));

    client.delete_setting("appconfig-lib.test", None).await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running emulator and .env file"]
async fn test_load_and_unmarshal() {
    #[derive(Deserialize)]
    struct Config {
        #[serde(rename = "TestKey", default)]
        test_key: String,
    }

    let cs = load_env().expect("Missing APP_CONFIGURATION_EMULATOR_CONNECTION_STRING. See module docs.");
    let client = AppConfigClient::from_connection_string(&cs).unwrap();
    client
        .set_setting(ConfigurationSetting::new("TestKey", "testvalue"))
        .await
        .unwrap();

    let config = provider::load(
        AuthenticationOptions::connection_string(cs),
        Options::default().selector(SettingSelector::new("*")),
    )
    .await
    .unwrap();

    let typed: Config = config.unmarshal(None).unwrap();
    assert_eq!(typed.test_key, "testvalue");
}
