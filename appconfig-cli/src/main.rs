//! Writes `TestKey` to an App Configuration store (or emulator), loads the
//! store back through the configuration provider and prints the bound value.
//!
//! Run with: cargo run -p appconfig-cli
//!
//! Requires (environment or .env file):
//! - APP_CONFIGURATION_EMULATOR_CONNECTION_STRING
//!
//! Log level is read from RUST_LOG (default: info).

use std::env;
use std::process;

use appconfig_lib::AppConfigClient;
use appconfig_lib::api::SettingSelector;
use appconfig_lib::model::ConfigurationSetting;
use appconfig_lib::provider;
use appconfig_lib::provider::AuthenticationOptions;
use appconfig_lib::provider::Options;
use serde::Deserialize;
use simplelog::ColorChoice;
use simplelog::Config as LogConfig;
use simplelog::LevelFilter;
use simplelog::TermLogger;
use simplelog::TerminalMode;

const CONNECTION_STRING_VAR: &str = "APP_CONFIGURATION_EMULATOR_CONNECTION_STRING";

const TEST_KEY: &str = "TestKey";
const TEST_VALUE: &str = "testvalue";

/// Shape the loaded settings are bound onto.
#[derive(Debug, Default, Deserialize)]
struct Config {
    #[serde(rename = "TestKey", default)]
    test_key: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let _ = dotenvy::dotenv();
    init_logging();

    let Some(connection_string) = connection_string_from(|name| env::var(name).ok()) else {
        fatal(&format!(
            "{} environment variable not found. Please run the start-emulator script first.",
            CONNECTION_STRING_VAR
        ));
    };

    let client = AppConfigClient::from_connection_string(&connection_string)
        .unwrap_or_else(|e| fatal(&format!("Failed to create client: {}", e)));

    client
        .set_setting(ConfigurationSetting::new(TEST_KEY, TEST_VALUE))
        .await
        .unwrap_or_else(|e| fatal(&format!("Failed to set configuration setting: {}", e)));
    log::debug!("Stored {} = {}", TEST_KEY, TEST_VALUE);

    let options = Options::default().selector(SettingSelector::new("*"));
    let loaded = provider::load(AuthenticationOptions::connection_string(connection_string), options)
        .await
        .unwrap_or_else(|e| fatal(&format!("Failed to load configuration: {}", e)));

    let config: Config = loaded
        .unmarshal(None)
        .unwrap_or_else(|e| fatal(&format!("Failed to unmarshal configuration: {}", e)));

    println!("{}", retrieved_line(&config));
}

fn init_logging() {
    let _ = TermLogger::init(
        log_level(env::var("RUST_LOG").ok()),
        LogConfig::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    );
}

/// Level from `RUST_LOG`, never below `error` so fatal messages stay visible.
fn log_level(setting: Option<String>) -> LevelFilter {
    setting
        .and_then(|level| level.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Info)
        .max(LevelFilter::Error)
}

/// Reads the connection string; unset and empty are both missing.
fn connection_string_from(lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    lookup(CONNECTION_STRING_VAR).filter(|value| !value.trim().is_empty())
}

fn retrieved_line(config: &Config) -> String {
    format!("Retrieved configuration: TestKey = {}", config.test_key)
}

fn fatal(message: &str) -> ! {
    log::error!("{}", message);
    process::exit(1);
}
