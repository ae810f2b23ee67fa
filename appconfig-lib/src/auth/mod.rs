//! Authentication
//!
//! Every request sent by [`AppConfigClient`](crate::AppConfigClient) is passed
//! through a [`Credential`], which returns the headers that authorize it.

mod credential;
mod hmac_sha256;

pub use credential::Credential;
pub use credential::StaticTokenCredential;
pub use hmac_sha256::HmacCredential;
pub use hmac_sha256::HmacToken;
pub use hmac_sha256::SIGNED_HEADERS;
pub use hmac_sha256::compute_signature;
pub use hmac_sha256::content_hash;
pub use hmac_sha256::host_header;
pub use hmac_sha256::path_and_query;
pub use hmac_sha256::string_to_sign;
pub use hmac_sha256::verify_signature;
