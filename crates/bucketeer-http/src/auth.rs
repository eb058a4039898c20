//! HTTP basic authentication for the broker API.
//!
//! Every `/v2` endpoint requires the platform to authenticate with a single
//! configured username and password. Comparison is constant time so the
//! check does not leak how much of a guess matched.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use subtle::ConstantTimeEq;

/// The broker's expected basic auth credentials.
#[derive(Clone)]
pub struct BasicCredentials {
    username: String,
    password: String,
}

impl std::fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("username", &self.username)
            .field("password", &"...")
            .finish()
    }
}

impl BasicCredentials {
    /// Credentials every request must present.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Whether the request's `Authorization` header carries these
    /// credentials.
    #[must_use]
    pub fn authorize(&self, headers: &http::HeaderMap) -> bool {
        let Some((username, password)) = headers
            .get(http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(decode_basic)
        else {
            return false;
        };

        let username_ok = username.as_bytes().ct_eq(self.username.as_bytes());
        let password_ok = password.as_bytes().ct_eq(self.password.as_bytes());
        (username_ok & password_ok).into()
    }
}

/// Decode a `Basic <base64(user:pass)>` header value into its parts.
fn decode_basic(header: &str) -> Option<(String, String)> {
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = BASE64.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_owned(), password.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with_auth(value: &str) -> http::HeaderMap {
        let mut headers = http::HeaderMap::new();
        headers.insert(
            http::header::AUTHORIZATION,
            http::HeaderValue::from_str(value).unwrap(),
        );
        headers
    }

    fn basic_header(username: &str, password: &str) -> String {
        format!("Basic {}", BASE64.encode(format!("{username}:{password}")))
    }

    #[test]
    fn test_should_accept_matching_credentials() {
        let credentials = BasicCredentials::new("broker", "s3cret");
        let headers = headers_with_auth(&basic_header("broker", "s3cret"));
        assert!(credentials.authorize(&headers));
    }

    #[test]
    fn test_should_reject_wrong_password() {
        let credentials = BasicCredentials::new("broker", "s3cret");
        let headers = headers_with_auth(&basic_header("broker", "guess"));
        assert!(!credentials.authorize(&headers));
    }

    #[test]
    fn test_should_reject_wrong_username() {
        let credentials = BasicCredentials::new("broker", "s3cret");
        let headers = headers_with_auth(&basic_header("intruder", "s3cret"));
        assert!(!credentials.authorize(&headers));
    }

    #[test]
    fn test_should_reject_missing_header() {
        let credentials = BasicCredentials::new("broker", "s3cret");
        assert!(!credentials.authorize(&http::HeaderMap::new()));
    }

    #[test]
    fn test_should_reject_non_basic_scheme() {
        let credentials = BasicCredentials::new("broker", "s3cret");
        let headers = headers_with_auth("Bearer some-token");
        assert!(!credentials.authorize(&headers));
    }

    #[test]
    fn test_should_reject_malformed_payload() {
        let credentials = BasicCredentials::new("broker", "s3cret");
        let headers = headers_with_auth("Basic not-base64!!!");
        assert!(!credentials.authorize(&headers));

        let no_colon = format!("Basic {}", BASE64.encode("brokers3cret"));
        let headers = headers_with_auth(&no_colon);
        assert!(!credentials.authorize(&headers));
    }

    #[test]
    fn test_should_allow_colons_in_password() {
        let credentials = BasicCredentials::new("broker", "a:b:c");
        let headers = headers_with_auth(&basic_header("broker", "a:b:c"));
        assert!(credentials.authorize(&headers));
    }

    #[test]
    fn test_should_redact_password_in_debug_output() {
        let credentials = BasicCredentials::new("broker", "s3cret");
        let debug = format!("{credentials:?}");
        assert!(debug.contains("broker"));
        assert!(!debug.contains("s3cret"));
    }
}
