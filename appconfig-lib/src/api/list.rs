//! Async iterator over key-value listings.

use reqwest::Method;
use reqwest::header::ACCEPT;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderValue;
use reqwest::header::LINK;
use serde::Deserialize;
use url::Url;

use super::execute::parse_json;
use super::filter::SettingSelector;
use crate::AppConfigClient;
use crate::error::ApiError;
use crate::error::Error;
use crate::model::ConfigurationSetting;

impl AppConfigClient {
    /// Lists settings matching a selector, one page at a time.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use appconfig_lib::AppConfigClient;
    /// use appconfig_lib::api::SettingSelector;
    ///
    /// # async fn run(client: AppConfigClient) -> Result<(), appconfig_lib::error::Error> {
    /// let mut pages = client.list_settings(SettingSelector::new("App.*"));
    ///
    /// while let Some(page) = pages.next().await {
    ///     for setting in page?.settings() {
    ///         println!("{} = {:?}", setting.key, setting.value);
    ///     }
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn list_settings(&self, selector: SettingSelector) -> SettingPages<'_> {
        SettingPages::new(self, selector)
    }
}

/// Async iterator that yields pages of settings.
///
/// Follows the body's `@nextLink`, or the `Link: <…>; rel="next"` header when
/// the body has none.
pub struct SettingPages<'a> {
    client: &'a AppConfigClient,
    /// Selector for the first request; taken on the first call to `next`.
    selector: Option<SettingSelector>,
    /// The next URL to fetch.
    next_url: Option<Url>,
    done: bool,
}

impl<'a> SettingPages<'a> {
    fn new(client: &'a AppConfigClient, selector: SettingSelector) -> Self {
        Self {
            client,
            selector: Some(selector),
            next_url: None,
            done: false,
        }
    }

    /// Fetches the next page of results.
    ///
    /// Returns `None` when all pages have been consumed.
    pub async fn next(&mut self) -> Option<Result<Page, Error>> {
        if self.done {
            return None;
        }

        let url = if let Some(selector) = self.selector.take() {
            self.first_url(&selector)
        } else if let Some(url) = self.next_url.take() {
            Ok(url)
        } else {
            self.done = true;
            return None;
        };

        let result = match url {
            Ok(url) => self.fetch(&url).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(page) => {
                if self.next_url.is_none() {
                    self.done = true;
                }
                Some(Ok(page))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }

    /// Drains every remaining page into one list.
    pub async fn collect_all(mut self) -> Result<Vec<ConfigurationSetting>, Error> {
        let mut settings = Vec::new();
        while let Some(page) = self.next().await {
            settings.extend(page?.into_settings());
        }
        Ok(settings)
    }

    fn first_url(&self, selector: &SettingSelector) -> Result<Url, Error> {
        let mut url = self.client.collection_url()?;
        url.query_pairs_mut()
            .extend_pairs(selector.query_pairs())
            .append_pair("api-version", self.client.api_version());
        Ok(url)
    }

    async fn fetch(&mut self, url: &Url) -> Result<Page, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "application/vnd.microsoft.appconfig.kvset+json, application/problem+json",
            ),
        );

        let response = self.client.request(Method::GET, url, headers, None).await?;
        let link_header = response
            .headers()
            .get_all(LINK)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(next_link_from_header);

        let body: ListResponse = parse_json(response).await?;
        let next_link = body.next_link.or(link_header);

        if let Some(link) = &next_link {
            self.next_url = Some(self.resolve(link)?);
        }

        log::debug!(
            "Listed {} settings{}",
            body.items.len(),
            if next_link.is_some() { ", more pages follow" } else { "" }
        );

        let mut page = Page::new(body.items);
        if let Some(link) = next_link {
            page = page.with_next_link(link);
        }
        Ok(page)
    }

    /// Resolves a (usually relative) next link against the endpoint.
    fn resolve(&self, link: &str) -> Result<Url, Error> {
        let mut url = self
            .client
            .endpoint()
            .join(link)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", link, e)))?;

        if !url.query_pairs().any(|(name, _)| name == "api-version") {
            url.query_pairs_mut()
                .append_pair("api-version", self.client.api_version());
        }
        Ok(url)
    }
}

/// Extracts the target of a `rel="next"` entry from a `Link` header value.
fn next_link_from_header(value: &str) -> Option<String> {
    value.split(',').find_map(|entry| {
        let (target, params) = entry.split_once(';')?;
        let is_next = params
            .split(';')
            .any(|p| matches!(p.trim(), "rel=\"next\"" | "rel=next"));

        is_next.then(|| {
            target
                .trim()
                .trim_start_matches('<')
                .trim_end_matches('>')
                .to_string()
        })
    })
}

/// Wire format of `GET /kv`.
#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    items: Vec<ConfigurationSetting>,
    #[serde(rename = "@nextLink")]
    next_link: Option<String>,
}

// =============================================================================
// Page
// =============================================================================

/// A page of listed settings with pagination information.
#[derive(Debug, Clone)]
pub struct Page {
    settings: Vec<ConfigurationSetting>,
    next_link: Option<String>,
}

impl Page {
    /// Creates a new page of settings.
    pub fn new(settings: Vec<ConfigurationSetting>) -> Self {
        Self {
            settings,
            next_link: None,
        }
    }

    /// Sets the link to the next page.
    pub fn with_next_link(mut self, next_link: impl Into<String>) -> Self {
        self.next_link = Some(next_link.into());
        self
    }

    /// Returns the settings in this page.
    pub fn settings(&self) -> &[ConfigurationSetting] {
        &self.settings
    }

    /// Consumes the page and returns the settings.
    pub fn into_settings(self) -> Vec<ConfigurationSetting> {
        self.settings
    }

    /// Returns the link to the next page, if any.
    pub fn next_link(&self) -> Option<&str> {
        self.next_link.as_deref()
    }

    /// Returns `true` if this page has no settings.
    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }

    /// Returns the number of settings in this page.
    pub fn len(&self) -> usize {
        self.settings.len()
    }

    /// Returns `true` if more pages are available.
    pub fn has_more(&self) -> bool {
        self.next_link.is_some()
    }
}
