//! Bind-time credentials.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

/// Characters escaped when embedding key material in the URI userinfo.
/// Everything outside the unreserved set is escaped.
const USERINFO: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Access credentials issued by a successful bind.
///
/// Handed to the caller exactly once; the broker keeps no copy and never
/// logs the secret.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Credentials {
    /// Connection URI, `s3://id:secret@endpoint/bucket`.
    pub uri: String,
    /// Access key id of the binding's principal.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_access_key: String,
    /// Region of the primary bucket.
    pub region: String,
    /// Endpoint host serving the primary bucket.
    pub endpoint: String,
    /// Primary bucket name.
    pub bucket: String,
    /// Names of additional buckets the credentials may access.
    pub additional_buckets: Vec<String>,
    /// Whether clients must skip TLS verification to reach the endpoint.
    pub insecure_skip_verify: bool,
}

/// Compose the connection URI for a bucket, percent-encoding the key
/// material into the userinfo section.
#[must_use]
pub fn bucket_uri(
    access_key_id: &str,
    secret_access_key: &str,
    endpoint: &str,
    bucket: &str,
) -> String {
    format!(
        "s3://{}:{}@{endpoint}/{bucket}",
        utf8_percent_encode(access_key_id, USERINFO),
        utf8_percent_encode(secret_access_key, USERINFO),
    )
}
