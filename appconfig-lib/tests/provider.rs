//! Provider load/bind tests against the in-process fake service.

mod common;

use appconfig_lib::api::SettingSelector;
use appconfig_lib::error::BindError;
use appconfig_lib::error::Error;
use appconfig_lib::provider;
use appconfig_lib::provider::AuthenticationOptions;
use appconfig_lib::provider::CasePolicy;
use appconfig_lib::provider::ConstructionOptions;
use appconfig_lib::provider::Options;
use common::FakeStore;
use serde::Deserialize;

fn auth(store: &FakeStore) -> AuthenticationOptions {
    AuthenticationOptions::connection_string(store.connection_string())
}

#[tokio::test]
async fn test_default_selector_loads_null_label_only() {
    let store = FakeStore::start().await;
    store.seed("TestKey", None, "testvalue", None);
    store.seed("Other", Some("dev"), "x", None);

    let config = provider::load(auth(&store), Options::default()).await.unwrap();

    assert_eq!(config.get("TestKey"), Some("testvalue"));
    assert_eq!(config.get("Other"), None);
    assert_eq!(config.keys().collect::<Vec<_>>(), vec!["TestKey"]);
}

#[tokio::test]
async fn test_later_selectors_override() {
    let store = FakeStore::start().await;
    store.seed("Color", None, "red", None);
    store.seed("Color", Some("prod"), "blue", None);
    store.seed("Size", None, "L", None);

    let options = Options::default()
        .selector(SettingSelector::all())
        .selector(SettingSelector::all().label("prod"));
    let config = provider::load(auth(&store), options).await.unwrap();

    assert_eq!(config.get("Color"), Some("blue"));
    assert_eq!(config.get("Size"), Some("L"));
}

#[tokio::test]
async fn test_feature_flags_are_excluded() {
    let store = FakeStore::start().await;
    store.seed(
        ".appconfig.featureflag/Beta",
        None,
        r#"{"id":"Beta","enabled":true}"#,
        Some("application/vnd.microsoft.appconfig.ff+json;charset=utf-8"),
    );
    store.seed("TestKey", None, "testvalue", None);

    let config = provider::load(auth(&store), Options::default()).await.unwrap();
    assert_eq!(config.snapshot().len(), 1);
}

#[tokio::test]
async fn test_trim_key_prefixes() {
    let store = FakeStore::start().await;
    store.seed("App:Web:Port", None, "8080", None);
    store.seed("App:Name", None, "demo", None);
    store.seed("App:", None, "dropped", None);

    let options = Options::default()
        .selector(SettingSelector::new("App:*"))
        .trim_key_prefix("App:")
        .trim_key_prefix("App:Web:");
    let config = provider::load(auth(&store), options).await.unwrap();

    assert_eq!(config.keys().collect::<Vec<_>>(), vec!["Name", "Port"]);
}

#[tokio::test]
async fn test_invalid_selector_fails_before_network() {
    let store = FakeStore::start().await;

    let options = Options::default().selector(SettingSelector::new("*").label("dev*"));
    let err = provider::load(auth(&store), options).await.unwrap_err();

    assert!(matches!(err, Error::InvalidSelector(_)));
    assert!(store.requests().is_empty());
}

#[tokio::test]
async fn test_malformed_credential_fails_before_network() {
    let err = provider::load(
        AuthenticationOptions::connection_string("Endpoint=http://localhost;Id=a"),
        Options::default(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::Auth(_)));
}

#[tokio::test]
async fn test_empty_store_is_not_an_error() {
    let store = FakeStore::start().await;
    let config = provider::load(auth(&store), Options::default()).await.unwrap();
    assert!(config.snapshot().is_empty());
}

#[tokio::test]
async fn test_refresh_replaces_snapshot() {
    let store = FakeStore::start().await;
    store.seed("k", None, "1", None);

    let mut config = provider::load(auth(&store), Options::default()).await.unwrap();
    assert_eq!(config.get("k"), Some("1"));

    store.seed("k", None, "2", None);
    store.seed("new", None, "x", None);
    config.refresh().await.unwrap();

    assert_eq!(config.get("k"), Some("2"));
    assert_eq!(config.get("new"), Some("x"));
}

#[tokio::test]
async fn test_refresh_failure_keeps_snapshot() {
    let store = FakeStore::start().await;
    store.seed("k", None, "1", None);

    let options = Options::default().client_options(appconfig_lib::ClientOptions {
        retry: appconfig_lib::retry::RetryConfig::no_retry(),
        ..Default::default()
    });
    let mut config = provider::load(auth(&store), options).await.unwrap();

    store.fail(1);
    assert!(config.refresh().await.is_err());
    assert_eq!(config.get("k"), Some("1"));
}

// =============================================================================
// Binding
// =============================================================================

#[derive(Debug, Deserialize)]
struct AppConfig {
    #[serde(rename = "Server")]
    server: Server,
    #[serde(rename = "Features", default)]
    features: Vec<String>,
    #[serde(rename = "Debug", default)]
    debug: bool,
}

#[derive(Debug, Deserialize)]
struct Server {
    #[serde(rename = "Host")]
    host: String,
    #[serde(rename = "Port")]
    port: u16,
}

#[tokio::test]
async fn test_unmarshal_nested_and_case_insensitive() {
    let store = FakeStore::start().await;
    store.seed("server.host", None, "localhost", None);
    store.seed("server.PORT", None, "8080", None);
    store.seed(
        "Features",
        None,
        r#"["a","b"]"#,
        Some("application/json; charset=utf-8"),
    );

    let config = provider::load(auth(&store), Options::default()).await.unwrap();
    let app: AppConfig = config.unmarshal(None).unwrap();

    assert_eq!(app.server.host, "localhost");
    assert_eq!(app.server.port, 8080);
    assert_eq!(app.features, vec!["a", "b"]);
    assert!(!app.debug);
}

#[tokio::test]
async fn test_unmarshal_case_sensitive_reports_missing_field() {
    let store = FakeStore::start().await;
    store.seed("server.host", None, "localhost", None);

    let config = provider::load(auth(&store), Options::default()).await.unwrap();
    let options = ConstructionOptions::default().case_policy(CasePolicy::Sensitive);
    let err = config.unmarshal::<AppConfig>(Some(&options)).unwrap_err();

    assert!(matches!(err, BindError::MissingField { ref field, .. } if field == "Server"));
}

#[tokio::test]
async fn test_unmarshal_invalid_value() {
    let store = FakeStore::start().await;
    store.seed("Server.Host", None, "h", None);
    store.seed("Server.Port", None, "http", None);

    let config = provider::load(auth(&store), Options::default()).await.unwrap();
    let err = config.unmarshal::<AppConfig>(None).unwrap_err();

    assert_eq!(err.path(), "Server.Port");
}

#[tokio::test]
async fn test_get_bytes_with_custom_separator() {
    let store = FakeStore::start().await;
    store.seed("App__Port", None, "80", None);

    let config = provider::load(auth(&store), Options::default()).await.unwrap();
    let options = ConstructionOptions::default().separator("__");
    let bytes = config.get_bytes(Some(&options)).unwrap();

    let tree: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(tree, serde_json::json!({"App": {"Port": "80"}}));
}
