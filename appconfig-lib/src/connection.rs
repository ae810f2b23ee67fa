//! Connection string parsing
//!
//! A connection string carries everything needed to reach and authenticate
//! against a configuration store:
//!
//! ```text
//! Endpoint=https://contoso.azconfig.io;Id=<access key id>;Secret=<base64 secret>
//! ```

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use url::Url;

use crate::auth::HmacCredential;
use crate::error::AuthError;

const ENDPOINT: &str = "Endpoint";
const ID: &str = "Id";
const SECRET: &str = "Secret";

/// A parsed store connection string.
///
/// Parsing never touches the network, so a malformed credential is reported
/// before any request is attempted.
///
/// # Example
///
/// ```
/// use appconfig_lib::ConnectionString;
///
/// let cs: ConnectionString = "Endpoint=http://localhost:8483;Id=emulator;Secret=YWJjZA=="
///     .parse()
///     .unwrap();
///
/// assert_eq!(cs.endpoint().as_str(), "http://localhost:8483/");
/// assert_eq!(cs.id(), "emulator");
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionString {
    endpoint: Url,
    id: String,
    secret: Vec<u8>,
}

impl ConnectionString {
    /// Parses a `Endpoint=…;Id=…;Secret=…` connection string.
    ///
    /// Field names are case-insensitive and may appear in any order. Values
    /// are split on the first `=` only, so base64 padding is preserved.
    pub fn parse(value: &str) -> Result<Self, AuthError> {
        if value.trim().is_empty() {
            return Err(AuthError::EmptyConnectionString);
        }

        let mut endpoint = None;
        let mut id = None;
        let mut secret = None;

        for segment in value.split(';') {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }

            let (name, field_value) =
                segment
                    .split_once('=')
                    .ok_or_else(|| AuthError::MalformedSegment {
                        segment: segment.to_string(),
                    })?;
            let name = name.trim();
            let field_value = field_value.trim();

            if name.eq_ignore_ascii_case(ENDPOINT) {
                endpoint = Some(field_value);
            } else if name.eq_ignore_ascii_case(ID) {
                id = Some(field_value);
            } else if name.eq_ignore_ascii_case(SECRET) {
                secret = Some(field_value);
            }
        }

        let endpoint = required(endpoint, ENDPOINT)?;
        let id = required(id, ID)?;
        let secret = required(secret, SECRET)?;

        Ok(Self {
            endpoint: parse_endpoint(endpoint)?,
            id: id.to_string(),
            secret: STANDARD
                .decode(secret)
                .map_err(|e| AuthError::InvalidSecret(e.to_string()))?,
        })
    }

    /// Returns the store endpoint.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Returns the access key id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the decoded access key secret.
    pub fn secret(&self) -> &[u8] {
        &self.secret
    }

    /// Builds the HMAC credential described by this connection string.
    pub fn credential(&self) -> HmacCredential {
        HmacCredential::new(self.id.clone(), self.secret.clone())
    }
}

impl FromStr for ConnectionString {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionString")
            .field("endpoint", &self.endpoint.as_str())
            .field("id", &self.id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

fn required<'a>(value: Option<&'a str>, field: &'static str) -> Result<&'a str, AuthError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AuthError::MissingField { field }),
    }
}

/// Parses an endpoint into an absolute http(s) URL with a host.
pub(crate) fn parse_endpoint(endpoint: &str) -> Result<Url, AuthError> {
    let invalid = |message: &str| AuthError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        message: message.to_string(),
    };

    let url = Url::parse(endpoint).map_err(|e| invalid(&e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host"));
    }

    Ok(url)
}
