//! HMAC-SHA256 access key signing
//!
//! Requests are signed with the access key from the connection string:
//!
//! ```text
//! x-ms-date:           Mon, 19 Oct 2026 10:00:00 GMT
//! x-ms-content-sha256: base64(SHA256(body))
//! Authorization:       HMAC-SHA256 Credential={id}&SignedHeaders=x-ms-date;host;x-ms-content-sha256&Signature={signature}
//! ```
//!
//! where `signature = base64(HMACSHA256(secret, VERB + "\n" + path_and_query + "\n" + signed_header_values))`
//! and the signed header values are joined with `;` in `SignedHeaders` order.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::DateTime;
use chrono::Utc;
use hmac::Hmac;
use hmac::Mac;
use reqwest::Method;
use reqwest::header::AUTHORIZATION;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderName;
use reqwest::header::HeaderValue;
use sha2::Digest;
use sha2::Sha256;
use url::Url;

use super::Credential;
use crate::error::AuthError;

type HmacSha256 = Hmac<Sha256>;

/// Authorization scheme name.
pub const SCHEME: &str = "HMAC-SHA256";

/// Headers covered by the signature, in signing order.
pub const SIGNED_HEADERS: &str = "x-ms-date;host;x-ms-content-sha256";

const MS_DATE: HeaderName = HeaderName::from_static("x-ms-date");
const MS_CONTENT_SHA256: HeaderName = HeaderName::from_static("x-ms-content-sha256");

/// Access key credential that signs each request with HMAC-SHA256.
///
/// Usually obtained from [`ConnectionString::credential`](crate::ConnectionString::credential).
#[derive(Clone)]
pub struct HmacCredential {
    id: String,
    secret: Vec<u8>,
}

impl HmacCredential {
    /// Creates a credential from an access key id and its decoded secret.
    pub fn new(id: impl Into<String>, secret: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            secret: secret.into(),
        }
    }

    /// Returns the access key id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Computes the signing headers for a request at a fixed point in time.
    pub fn sign(
        &self,
        method: &Method,
        url: &Url,
        body: &[u8],
        date: DateTime<Utc>,
    ) -> Result<HeaderMap, AuthError> {
        let date = date.format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let hash = content_hash(body);
        let host = host_header(url)?;

        let to_sign = string_to_sign(
            method.as_str(),
            &path_and_query(url),
            &[&date, &host, &hash],
        );
        let signature = compute_signature(&self.secret, &to_sign)?;

        let authorization = format!(
            "{} Credential={}&SignedHeaders={}&Signature={}",
            SCHEME, self.id, SIGNED_HEADERS, signature
        );

        let mut headers = HeaderMap::new();
        headers.insert(MS_DATE, header_value(&date)?);
        headers.insert(MS_CONTENT_SHA256, header_value(&hash)?);
        headers.insert(AUTHORIZATION, header_value(&authorization)?);
        Ok(headers)
    }
}

impl std::fmt::Debug for HmacCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacCredential")
            .field("id", &self.id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl Credential for HmacCredential {
    async fn authorize(
        &self,
        method: &Method,
        url: &Url,
        body: &[u8],
    ) -> Result<HeaderMap, AuthError> {
        self.sign(method, url, body, Utc::now())
    }
}

/// Base64 SHA-256 digest of a request body.
pub fn content_hash(body: &[u8]) -> String {
    STANDARD.encode(Sha256::digest(body))
}

/// Value of the `Host` header for a URL; includes the port only when it is
/// not the scheme's default, matching what the HTTP client sends.
pub fn host_header(url: &Url) -> Result<String, AuthError> {
    let host = url
        .host_str()
        .ok_or_else(|| AuthError::InvalidHeader(format!("URL has no host: {}", url)))?;

    Ok(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// Request target as it appears on the wire: path plus optional query.
pub fn path_and_query(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

/// Canonical string covered by the signature.
pub fn string_to_sign(method: &str, path_and_query: &str, signed_values: &[&str]) -> String {
    format!(
        "{}\n{}\n{}",
        method.to_ascii_uppercase(),
        path_and_query,
        signed_values.join(";")
    )
}

/// Base64 HMAC-SHA256 of `to_sign` keyed with `secret`.
pub fn compute_signature(secret: &[u8], to_sign: &str) -> Result<String, AuthError> {
    Ok(STANDARD.encode(mac(secret, to_sign)?.finalize().into_bytes()))
}

/// Checks a base64 signature in constant time.
pub fn verify_signature(secret: &[u8], to_sign: &str, signature: &str) -> bool {
    match STANDARD.decode(signature) {
        Ok(bytes) if !bytes.is_empty() => mac(secret, to_sign)
            .is_ok_and(|mac| mac.verify_slice(&bytes).is_ok()),
        _ => false,
    }
}

fn mac(secret: &[u8], to_sign: &str) -> Result<HmacSha256, AuthError> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret)
        .map_err(|e| AuthError::InvalidSecret(e.to_string()))?;
    mac.update(to_sign.as_bytes());
    Ok(mac)
}

fn header_value(value: &str) -> Result<HeaderValue, AuthError> {
    HeaderValue::from_str(value).map_err(|e| AuthError::InvalidHeader(e.to_string()))
}

/// Parsed `Credential=…&SignedHeaders=…&Signature=…` authorization parameters.
///
/// Parameters may be separated by `&` or `,` and surrounded by whitespace.
/// When a parameter repeats, the first occurrence wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HmacToken {
    /// Access key id.
    pub credential: Option<String>,
    /// Names of the signed headers, in signing order.
    pub signed_headers: Option<Vec<String>>,
    /// Base64 signature.
    pub signature: Option<String>,
}

impl HmacToken {
    /// Parses the parameters part of an HMAC authorization header.
    pub fn parse(token: &str) -> Self {
        let mut parsed = Self::default();

        for part in token.split(['&', ',']) {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }

            let (name, value) = part.split_once('=').unwrap_or((part, ""));

            match name {
                "Credential" if parsed.credential.is_none() => {
                    parsed.credential = Some(value.to_string());
                }
                "SignedHeaders" if parsed.signed_headers.is_none() => {
                    parsed.signed_headers = Some(
                        value
                            .split(';')
                            .map(|h| h.trim().to_string())
                            .collect(),
                    );
                }
                "Signature" if parsed.signature.is_none() => {
                    parsed.signature = Some(value.to_string());
                }
                _ => {}
            }
        }

        parsed
    }

    /// Parses a full `Authorization` header value, returning `None` when the
    /// scheme is not HMAC-SHA256.
    pub fn from_authorization(header: &str) -> Option<Self> {
        let (scheme, rest) = header.trim().split_once(' ')?;
        scheme
            .eq_ignore_ascii_case(SCHEME)
            .then(|| Self::parse(rest))
    }
}
