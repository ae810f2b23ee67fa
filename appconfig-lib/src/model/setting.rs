//! Configuration setting (key-value) model

use std::collections::BTreeMap;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

/// Key prefix reserved for feature flags.
pub const FEATURE_FLAG_PREFIX: &str = ".appconfig.featureflag/";

/// Content type of feature flag settings.
pub const FEATURE_FLAG_CONTENT_TYPE: &str = "application/vnd.microsoft.appconfig.ff+json;charset=utf-8";

/// A key-value stored in the configuration store.
///
/// Settings are identified by `key` plus an optional `label`; a missing label
/// is the "null label". Read-only metadata (`etag`, `last_modified`, `locked`)
/// is filled in by the service.
///
/// # Example
///
/// ```
/// use appconfig_lib::model::ConfigurationSetting;
///
/// let setting = ConfigurationSetting::new("TestKey", "testvalue")
///     .with_label("dev")
///     .with_tag("owner", "platform");
///
/// assert_eq!(setting.value.as_deref(), Some("testvalue"));
/// assert_eq!(setting.label.as_deref(), Some("dev"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationSetting {
    /// The setting key.
    pub key: String,
    /// The label, `None` for the null label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// The raw string value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Media type describing how to interpret `value`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Entity tag for optimistic concurrency.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// When the setting was last written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    /// Whether the setting is read-only.
    #[serde(default)]
    pub locked: bool,
    /// Free-form tags.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

impl ConfigurationSetting {
    /// Creates a setting with the null label.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
            ..Default::default()
        }
    }

    /// Sets the label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Sets the content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Adds a tag.
    pub fn with_tag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(name.into(), value.into());
        self
    }

    /// Returns `true` if this setting is a feature flag.
    pub fn is_feature_flag(&self) -> bool {
        self.key.starts_with(FEATURE_FLAG_PREFIX)
    }

    /// Returns `true` if the content type denotes JSON
    /// (`application/json` or any `application/*+json`).
    pub fn is_json(&self) -> bool {
        self.content_type.as_deref().is_some_and(is_json_content_type)
    }

    /// Body sent when writing this setting.
    pub(crate) fn write_body(&self) -> SettingBody<'_> {
        SettingBody {
            value: self.value.as_deref(),
            content_type: self.content_type.as_deref(),
            tags: &self.tags,
        }
    }
}

/// Writable part of a setting, as sent in `PUT /kv/{key}`.
#[derive(Debug, Serialize)]
pub(crate) struct SettingBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_type: Option<&'a str>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    tags: &'a BTreeMap<String, String>,
}

/// Returns `true` for `application/json` and `application/*+json`, ignoring
/// parameters such as `charset`.
pub fn is_json_content_type(content_type: &str) -> bool {
    let media_type = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match media_type.split_once('/') {
        Some(("application", subtype)) => subtype == "json" || subtype.ends_with("+json"),
        _ => false,
    }
}
