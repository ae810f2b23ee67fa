//! Request execution
//!
//! Every operation goes through [`AppConfigClient::request`], which signs the
//! request, applies the timeout and cancellation token, and retries
//! throttling, server and network failures according to the client's
//! [`RetryConfig`](crate::retry::RetryConfig).

use std::time::Duration;

use reqwest::Method;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use url::Url;

use crate::AppConfigClient;
use crate::error::ApiError;
use crate::error::Error;
use crate::retry::parse_retry_after;

/// Media type of a single key-value.
pub const KV_MEDIA_TYPE: &str = "application/vnd.microsoft.appconfig.kv+json";

/// Media type of a key-value collection.
pub const KVSET_MEDIA_TYPE: &str = "application/vnd.microsoft.appconfig.kvset+json";

/// Media type of RFC 7807 error bodies.
pub const PROBLEM_MEDIA_TYPE: &str = "application/problem+json";

impl AppConfigClient {
    /// URL of a single key-value: `/kv/{key}?label=…&api-version=…`.
    pub(crate) fn kv_url(&self, key: &str, label: Option<&str>) -> Result<Url, Error> {
        if key.is_empty() {
            return Err(ApiError::InvalidUrl("setting key must not be empty".to_string()).into());
        }
        // `.` and `..` are dot-segments; the URL parser would collapse them into `/kv`.
        if key == "." || key == ".." {
            return Err(ApiError::InvalidUrl(format!("setting key '{}' is not addressable", key)).into());
        }

        let mut url = self.collection_url()?;
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.inner.endpoint.to_string()))?
            .push(key);

        {
            let mut query = url.query_pairs_mut();
            if let Some(label) = label {
                query.append_pair("label", label);
            }
            query.append_pair("api-version", self.api_version());
        }
        Ok(url)
    }

    /// URL of the key-value collection: `/kv` without a query.
    pub(crate) fn collection_url(&self) -> Result<Url, Error> {
        let mut url = self.inner.endpoint.clone();
        url.set_query(None);
        url.set_fragment(None);
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.inner.endpoint.to_string()))?
            .pop_if_empty()
            .push("kv");
        Ok(url)
    }

    /// Makes an HTTP request with signing and retry logic.
    ///
    /// This is the low-level request method used by all API operations.
    /// Non-success statuses are turned into [`ApiError::Http`].
    pub(crate) async fn request(
        &self,
        method: Method,
        url: &Url,
        headers: impl Into<Option<HeaderMap>>,
        body: Option<String>,
    ) -> Result<reqwest::Response, Error> {
        let headers = headers.into().unwrap_or_default();
        let retry_config = &self.inner.options.retry;
        let mut attempts = 0;
        let mut delay = retry_config.initial_delay;

        loop {
            log::debug!("{} {}", method, url);

            let result = self
                .send_request_inner(method.clone(), url, headers.clone(), body.as_deref())
                .await;

            match result {
                Ok(response) => {
                    let status = response.status();

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        let retry_after = parse_retry_after(response.headers());
                        if !retry_config.retry_on_429 || attempts >= retry_config.max_retries {
                            return Err(Error::RateLimit { retry_after });
                        }

                        let wait = retry_after
                            .map(|wait| wait.min(retry_config.max_delay))
                            .unwrap_or(delay);
                        log::warn!(
                            "{} {} throttled, retrying in {:?} (attempt {}/{})",
                            method,
                            url,
                            wait,
                            attempts + 1,
                            retry_config.max_retries
                        );
                        self.backoff(wait).await?;
                        attempts += 1;
                        continue;
                    }

                    if status.is_server_error() {
                        if !retry_config.retry_on_5xx || attempts >= retry_config.max_retries {
                            return Err(error_from_response(response).await.into());
                        }

                        log::warn!(
                            "{} {} returned {}, retrying in {:?} (attempt {}/{})",
                            method,
                            url,
                            status,
                            delay,
                            attempts + 1,
                            retry_config.max_retries
                        );
                        self.backoff(delay).await?;
                        delay = retry_config.next_delay(delay);
                        attempts += 1;
                        continue;
                    }

                    if status.is_success() {
                        return Ok(response);
                    }

                    log::debug!("{} {} returned {}", method, url, status);
                    return Err(error_from_response(response).await.into());
                }
                Err(e) => {
                    let is_transient = matches!(&e, Error::Api(api) if api.is_retryable());

                    if is_transient
                        && retry_config.retry_on_network
                        && attempts < retry_config.max_retries
                    {
                        log::warn!(
                            "{} {} failed: {}, retrying in {:?} (attempt {}/{})",
                            method,
                            url,
                            e,
                            delay,
                            attempts + 1,
                            retry_config.max_retries
                        );
                        self.backoff(delay).await?;
                        delay = retry_config.next_delay(delay);
                        attempts += 1;
                        continue;
                    }

                    return Err(e);
                }
            }
        }
    }

    /// Inner request method without retry logic.
    async fn send_request_inner(
        &self,
        method: Method,
        url: &Url,
        headers: HeaderMap,
        body: Option<&str>,
    ) -> Result<reqwest::Response, Error> {
        let token = &self.inner.options.cancellation_token;
        if token.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let body = body.unwrap_or_default();
        let auth_headers = self
            .inner
            .credential
            .authorize(&method, url, body.as_bytes())
            .await?;

        let mut request = self
            .inner
            .http_client
            .request(method, url.clone())
            .headers(headers)
            .headers(auth_headers);

        let timeout = self.inner.options.timeout;
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        if !body.is_empty() {
            request = request.body(body.to_string());
        }

        tokio::select! {
            _ = token.cancelled() => Err(Error::Cancelled),
            result = request.send() => result.map_err(|e| Error::from(network_error(e, timeout))),
        }
    }

    /// Sleeps for `wait` unless the client is cancelled first.
    async fn backoff(&self, wait: Duration) -> Result<(), Error> {
        tokio::select! {
            _ = self.inner.options.cancellation_token.cancelled() => Err(Error::Cancelled),
            _ = tokio::time::sleep(wait) => Ok(()),
        }
    }
}

fn network_error(e: reqwest::Error, timeout: Option<Duration>) -> ApiError {
    match timeout {
        Some(timeout) if e.is_timeout() => ApiError::Timeout(timeout),
        _ => ApiError::Network(e),
    }
}

/// Converts a non-success response into an [`ApiError::Http`].
pub(crate) async fn error_from_response(response: reqwest::Response) -> ApiError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    ApiError::from_body(status, &body)
}

/// Reads a response body and deserializes it as JSON.
pub(crate) async fn parse_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, Error> {
    let body = response.text().await.map_err(ApiError::from)?;
    serde_json::from_str(&body)
        .map_err(|e| Error::from(ApiError::parse_with_body(e.to_string(), body)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(endpoint: &str) -> AppConfigClient {
        AppConfigClient::from_connection_string(&format!(
            "Endpoint={};Id=a;Secret=c2VjcmV0",
            endpoint
        ))
        .unwrap()
    }

    #[test]
    fn test_kv_url() {
        let url = client("http://localhost:8483")
            .kv_url("TestKey", None)
            .unwrap();
        assert_eq!(url.as_str(), "http://localhost:8483/kv/TestKey?api-version=1.0");
    }

    #[test]
    fn test_kv_url_encodes_key_and_label() {
        let url = client("https://contoso.azconfig.io/")
            .kv_url("app/db:conn string", Some("prod & test"))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://contoso.azconfig.io/kv/app%2Fdb:conn%20string?label=prod+%26+test&api-version=1.0"
        );
    }

    #[test]
    fn test_kv_url_rejects_empty_key() {
        let err = client("http://localhost:8483").kv_url("", None).unwrap_err();
        assert!(matches!(err, Error::Api(ApiError::InvalidUrl(_))));
    }

    #[test]
    fn test_kv_url_rejects_dot_segments() {
        let client = client("http://localhost:8483");
        for key in [".", ".."] {
            let err = client.kv_url(key, None).unwrap_err();
            assert!(matches!(err, Error::Api(ApiError::InvalidUrl(_))), "{}", key);
        }

        let url = client.kv_url(".hidden", None).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8483/kv/.hidden?api-version=1.0");
        let url = client.kv_url("a%b", None).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8483/kv/a%25b?api-version=1.0");
    }

    #[test]
    fn test_collection_url_drops_query() {
        let url = client("http://localhost:8483/?x=1").collection_url().unwrap();
        assert_eq!(url.as_str(), "http://localhost:8483/kv");
    }
}
