//! Single key-value operations

use reqwest::Method;
use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use reqwest::header::CONTENT_TYPE;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderValue;
use reqwest::header::IF_NONE_MATCH;

use super::execute::KV_MEDIA_TYPE;
use super::execute::parse_json;
use crate::AppConfigClient;
use crate::error::ApiError;
use crate::error::Error;
use crate::model::ConfigurationSetting;

impl AppConfigClient {
    /// Creates or replaces a setting.
    ///
    /// Writing the same key and label twice is an idempotent upsert. Returns
    /// the stored setting, including the service-assigned etag.
    pub async fn set_setting(
        &self,
        setting: ConfigurationSetting,
    ) -> Result<ConfigurationSetting, Error> {
        self.put_setting(&setting, HeaderMap::new()).await
    }

    /// Creates a setting only if no setting with the same key and label exists.
    ///
    /// Fails with HTTP 412 when the setting already exists.
    pub async fn add_setting(
        &self,
        setting: ConfigurationSetting,
    ) -> Result<ConfigurationSetting, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(IF_NONE_MATCH, HeaderValue::from_static("*"));
        self.put_setting(&setting, headers).await
    }

    /// Retrieves a setting, or `None` if it does not exist.
    pub async fn get_setting(
        &self,
        key: &str,
        label: Option<&str>,
    ) -> Result<Option<ConfigurationSetting>, Error> {
        let url = self.kv_url(key, label)?;

        match self.request(Method::GET, &url, kv_headers(), None).await {
            Ok(response) => parse_json(response).await.map(Some),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Deletes a setting, returning it if it existed.
    pub async fn delete_setting(
        &self,
        key: &str,
        label: Option<&str>,
    ) -> Result<Option<ConfigurationSetting>, Error> {
        let url = self.kv_url(key, label)?;

        match self.request(Method::DELETE, &url, kv_headers(), None).await {
            Ok(response) if response.status() == StatusCode::NO_CONTENT => Ok(None),
            Ok(response) => parse_json(response).await.map(Some),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn put_setting(
        &self,
        setting: &ConfigurationSetting,
        mut headers: HeaderMap,
    ) -> Result<ConfigurationSetting, Error> {
        let url = self.kv_url(&setting.key, setting.label.as_deref())?;
        let body = serde_json::to_string(&setting.write_body())
            .map_err(|e| ApiError::parse(e.to_string()))?;

        headers.extend(kv_headers());
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(KV_MEDIA_TYPE));

        let response = self.request(Method::PUT, &url, headers, Some(body)).await?;
        let stored: ConfigurationSetting = parse_json(response).await?;

        log::debug!(
            "Stored setting '{}' (label {:?}, etag {:?})",
            stored.key,
            stored.label,
            stored.etag
        );
        Ok(stored)
    }
}

fn kv_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/vnd.microsoft.appconfig.kv+json, application/problem+json"),
    );
    headers
}
