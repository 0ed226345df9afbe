//! URL validation for provider endpoints
//!
//! Endpoint candidates come from defaults, environment variables, CLI flags
//! or a config file. Each one is checked once at startup so a typo surfaces
//! as a configuration error instead of a failed connect attempt. A valid
//! endpoint:
//! - Uses the `ws` or `wss` scheme
//! - Has a host
//! - Is properly formatted

use thiserror::Error;
use tracing::warn;
use url::Url;

/// Errors that can occur during endpoint validation
#[derive(Debug, Error)]
pub enum UrlValidationError {
    #[error("Invalid URL format: {0}")]
    InvalidFormat(#[from] url::ParseError),

    #[error("URL scheme must be ws or wss, got: {0}")]
    WebSocketRequired(String),

    #[error("URL must have a host")]
    MissingHost,

    #[error("URL must not carry credentials")]
    CredentialsNotAllowed,
}

/// Validates a provider endpoint URL
///
/// Plain `ws` is accepted (local mocks and proxies) but logged at warn level.
///
/// # Arguments
/// * `endpoint` - The endpoint URL to validate
///
/// # Returns
/// * `Ok(Url)` - The parsed URL
/// * `Err(UrlValidationError)` - If the endpoint is unusable
pub fn validate_endpoint_url(endpoint: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(endpoint.trim())?;

    match url.scheme() {
        "wss" => {}
        "ws" => {
            warn!(endpoint = %url, "Endpoint uses unencrypted ws://");
        }
        other => return Err(UrlValidationError::WebSocketRequired(other.to_string())),
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(UrlValidationError::MissingHost);
    }

    // The credential travels in the Authorization header only.
    if !url.username().is_empty() || url.password().is_some() {
        return Err(UrlValidationError::CredentialsNotAllowed);
    }

    Ok(url)
}

/// Append the `model` query pair to an endpoint.
///
/// An existing `model` pair is replaced so an override URL copied from a
/// browser does not end up with two.
pub fn with_model(endpoint: &Url, model: &str) -> Url {
    let mut url = endpoint.clone();
    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "model")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        for (k, v) in &retained {
            pairs.append_pair(k, v);
        }
        pairs.append_pair("model", model);
    }
    url
}

/// Host header value for an endpoint (`host` or `host:port`).
pub fn host_header(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wss_endpoint_is_valid() {
        let url = validate_endpoint_url("wss://dashscope.aliyuncs.com/api-ws/v1/realtime").unwrap();
        assert_eq!(url.host_str(), Some("dashscope.aliyuncs.com"));
    }

    #[test]
    fn test_ws_endpoint_is_allowed() {
        assert!(validate_endpoint_url("ws://127.0.0.1:9000/realtime").is_ok());
    }

    #[test]
    fn test_http_scheme_rejected() {
        let result = validate_endpoint_url("https://dashscope.aliyuncs.com/api-ws/v1/realtime");
        assert!(matches!(
            result,
            Err(UrlValidationError::WebSocketRequired(_))
        ));
    }

    #[test]
    fn test_invalid_format_rejected() {
        assert!(matches!(
            validate_endpoint_url("not a url"),
            Err(UrlValidationError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_credentials_rejected() {
        assert!(matches!(
            validate_endpoint_url("wss://user:pw@example.com/realtime"),
            Err(UrlValidationError::CredentialsNotAllowed)
        ));
    }

    #[test]
    fn test_with_model_appends_query() {
        let url = Url::parse("wss://example.com/api-ws/v1/realtime").unwrap();
        let full = with_model(&url, "qwen3-asr-flash-realtime");
        assert_eq!(
            full.as_str(),
            "wss://example.com/api-ws/v1/realtime?model=qwen3-asr-flash-realtime"
        );
    }

    #[test]
    fn test_with_model_replaces_existing_model() {
        let url = Url::parse("wss://example.com/realtime?model=old&region=cn").unwrap();
        let full = with_model(&url, "new");
        assert_eq!(full.as_str(), "wss://example.com/realtime?region=cn&model=new");
    }

    #[test]
    fn test_host_header() {
        let url = Url::parse("ws://127.0.0.1:9000/x").unwrap();
        assert_eq!(host_header(&url), "127.0.0.1:9000");
        let url = Url::parse("wss://example.com/x").unwrap();
        assert_eq!(host_header(&url), "example.com");
    }
}
