//! Shared blocking HTTP plumbing for the adapters.
//!
//! One attempt per call. Status and transport failures are mapped onto
//! `FetchErrorKind` here so every adapter classifies them the same way.

use super::provider::FetchError;
use serde::de::DeserializeOwned;
use std::time::Duration;

const USER_AGENT: &str = concat!("btctop/", env!("CARGO_PKG_VERSION"));

/// Build a client whose every request is bounded by `timeout`.
pub fn build_client(
    provider: &str,
    timeout: Duration,
) -> Result<reqwest::blocking::Client, FetchError> {
    reqwest::blocking::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| FetchError::network(provider, format!("failed to build HTTP client: {e}")))
}

/// Send a prepared request and return the body of a successful response.
pub fn get_body(
    provider: &str,
    request: reqwest::blocking::RequestBuilder,
) -> Result<String, FetchError> {
    let resp = request.send().map_err(|e| {
        if e.is_timeout() {
            FetchError::network(provider, format!("request timed out: {e}"))
        } else {
            FetchError::network(provider, e.to_string())
        }
    })?;

    let status = resp.status();
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(FetchError::auth_missing(
            provider,
            format!("credential rejected (HTTP {status})"),
        ));
    }
    if !status.is_success() {
        return Err(FetchError::network(provider, format!("HTTP {status}")));
    }

    resp.text()
        .map_err(|e| FetchError::network(provider, format!("failed to read body: {e}")))
}

/// Decode a JSON payload, reporting shape mismatches as parse failures.
pub fn decode<T: DeserializeOwned>(provider: &str, body: &str) -> Result<T, FetchError> {
    serde_json::from_str(body)
        .map_err(|e| FetchError::parse(provider, format!("unexpected response shape: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::provider::FetchErrorKind;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Payload {
        #[allow(dead_code)]
        value: f64,
    }

    #[test]
    fn decode_mismatch_is_parse_failure() {
        let err = decode::<Payload>("test", r#"{"value":"abc"}"#).unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::ParseFailure);
        assert_eq!(err.provider, "test");
    }

    #[test]
    fn decode_garbage_is_parse_failure() {
        let err = decode::<Payload>("test", "<html>rate limited</html>").unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::ParseFailure);
    }

    #[test]
    fn client_builds_with_timeout() {
        assert!(build_client("test", Duration::from_secs(5)).is_ok());
    }
}
