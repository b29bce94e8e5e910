//! Envelope translation and upstream execution.
//!
//! # Responsibilities
//! - Validate the inbound envelope (path, method, headers)
//! - Build the outbound URL, header set and optional JSON body
//! - Execute exactly one upstream request
//! - Map the outcome to a success envelope or a `ForwardError`
//!
//! # Design Decisions
//! - Translation (`prepare`) is pure so it can be tested without a network
//! - The forwarder holds only immutable data and a pooled client; it is
//!   shared across requests behind an `Arc`
//! - Caller headers are applied last and replace defaults of the same name

use std::time::Duration;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method};
use reqwest::Client;
use serde_json::Value;

use crate::config::UpstreamConfig;
use crate::proxy::envelope::{OutboundRequest, ProxyRequest, ProxyResponse, UpstreamResponse};
use crate::proxy::error::{ForwardError, SetupError};
use crate::proxy::query::{encode_query, render_scalar};

/// Verbs accepted in the `method` field.
const SUPPORTED_METHODS: [Method; 7] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::HEAD,
    Method::OPTIONS,
];

/// Stateless translator between proxy envelopes and upstream requests.
#[derive(Clone)]
pub struct Forwarder {
    client: Client,
    base_url: String,
    token_header: HeaderName,
    /// `None` when no access token is configured.
    token: Option<HeaderValue>,
}

impl Forwarder {
    /// Create a forwarder with a client built from `upstream`.
    pub fn new(upstream: &UpstreamConfig) -> Result<Self, SetupError> {
        let mut builder = Client::builder();
        if let Some(secs) = upstream.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Self::with_client(upstream, builder.build()?)
    }

    /// Create a forwarder around an existing client.
    pub fn with_client(upstream: &UpstreamConfig, client: Client) -> Result<Self, SetupError> {
        let token_header = HeaderName::from_bytes(upstream.token_header.as_bytes())
            .map_err(|_| SetupError::TokenHeader(upstream.token_header.clone()))?;

        let token = if upstream.access_token.is_empty() {
            None
        } else {
            let mut value =
                HeaderValue::from_str(&upstream.access_token).map_err(|_| SetupError::AccessToken)?;
            value.set_sensitive(true);
            Some(value)
        };

        Ok(Self {
            client,
            base_url: upstream.base_url.clone(),
            token_header,
            token,
        })
    }

    /// Translate and execute one envelope.
    pub async fn forward(&self, request: ProxyRequest) -> ProxyResponse {
        let outbound = self.prepare(&request)?;
        self.execute(outbound).await
    }

    /// Translate an envelope into the upstream request it describes.
    pub fn prepare(&self, request: &ProxyRequest) -> Result<OutboundRequest, ForwardError> {
        let api_path = request
            .api_path
            .as_deref()
            .filter(|path| !path.is_empty())
            .ok_or(ForwardError::MissingApiPath)?;

        let method = parse_method(request.method.as_deref())?;

        let mut raw_url = format!("{}{}", self.base_url, api_path);
        if let Some(query) = request.query_entries().and_then(encode_query) {
            raw_url.push('?');
            raw_url.push_str(&query);
        }
        let url = url::Url::parse(&raw_url).map_err(|source| ForwardError::InvalidUrl {
            url: raw_url.clone(),
            source,
        })?;

        let headers = self.build_headers(request)?;

        let body = match &request.post_data {
            Some(data) if method != Method::GET && has_content(data) => {
                Some(data.to_string().into_bytes())
            }
            _ => None,
        };

        Ok(OutboundRequest {
            method,
            url,
            headers,
            body,
        })
    }

    /// Send a prepared request and classify the reply.
    pub async fn execute(&self, outbound: OutboundRequest) -> ProxyResponse {
        tracing::debug!(
            method = %outbound.method,
            url = %outbound.url,
            has_body = outbound.body.is_some(),
            "Forwarding request upstream"
        );

        let mut builder = self
            .client
            .request(outbound.method, outbound.url)
            .headers(outbound.headers);
        if let Some(body) = outbound.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response.bytes().await?;

        if status.is_success() {
            Ok(UpstreamResponse {
                status,
                content_type,
                body,
            })
        } else {
            Err(ForwardError::Upstream {
                status,
                details: decode_details(&body),
            })
        }
    }

    fn build_headers(&self, request: &ProxyRequest) -> Result<HeaderMap, ForwardError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &self.token {
            headers.insert(self.token_header.clone(), token.clone());
        }
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let Some(extra) = request.header_entries() else {
            return Ok(headers);
        };

        for (raw_name, raw_value) in extra {
            let Some(rendered) = render_scalar(raw_value) else {
                continue;
            };
            let name = HeaderName::from_bytes(raw_name.as_bytes())
                .map_err(|_| ForwardError::InvalidHeader(raw_name.clone()))?;
            let value = HeaderValue::from_str(&rendered)
                .map_err(|_| ForwardError::InvalidHeader(raw_name.clone()))?;
            headers.insert(name, value);
        }

        Ok(headers)
    }
}

impl std::fmt::Debug for Forwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Forwarder")
            .field("base_url", &self.base_url)
            .field("token_header", &self.token_header)
            .field("has_token", &self.token.is_some())
            .finish()
    }
}

/// Resolve the envelope's verb. Absent or blank means GET.
fn parse_method(raw: Option<&str>) -> Result<Method, ForwardError> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Ok(Method::GET),
        Some(raw) => raw,
    };

    let normalized = raw.to_ascii_uppercase();
    SUPPORTED_METHODS
        .iter()
        .find(|m| m.as_str() == normalized)
        .cloned()
        .ok_or_else(|| ForwardError::UnsupportedMethod(raw.to_string()))
}

/// Whether a payload is worth sending as a body.
fn has_content(data: &Value) -> bool {
    match data {
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::String(s) => !s.is_empty(),
        _ => false,
    }
}

/// Upstream error body as JSON; non-JSON text becomes a string, empty becomes null.
fn decode_details(body: &[u8]) -> Value {
    if body.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn forwarder() -> Forwarder {
        let upstream = UpstreamConfig {
            base_url: "https://gitlab.example.com/api/v4".into(),
            access_token: "glpat-test".into(),
            ..UpstreamConfig::default()
        };
        Forwarder::new(&upstream).unwrap()
    }

    fn request(value: Value) -> ProxyRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_missing_or_empty_api_path() {
        let fwd = forwarder();
        assert!(matches!(
            fwd.prepare(&ProxyRequest::default()),
            Err(ForwardError::MissingApiPath)
        ));
        assert!(matches!(
            fwd.prepare(&ProxyRequest::new("")),
            Err(ForwardError::MissingApiPath)
        ));
    }

    #[test]
    fn test_defaults_to_get_without_body() {
        let outbound = forwarder()
            .prepare(&request(json!({
                "apiPath": "/projects",
                "postData": {"ignored": true}
            })))
            .unwrap();

        assert_eq!(outbound.method, Method::GET);
        assert!(outbound.body.is_none());
        assert_eq!(outbound.url.as_str(), "https://gitlab.example.com/api/v4/projects");
    }

    #[test]
    fn test_explicit_get_never_sends_body() {
        let outbound = forwarder()
            .prepare(&request(json!({
                "apiPath": "/projects",
                "method": "get",
                "postData": {"ignored": true}
            })))
            .unwrap();
        assert_eq!(outbound.method, Method::GET);
        assert!(outbound.body.is_none());
    }

    #[test]
    fn test_post_with_data_sends_json_body() {
        let outbound = forwarder()
            .prepare(&request(json!({
                "apiPath": "/projects/7/issues",
                "method": "POST",
                "postData": {"title": "Broken build", "labels": ["ci"]}
            })))
            .unwrap();

        assert_eq!(outbound.method, Method::POST);
        let body: Value = serde_json::from_slice(outbound.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, json!({"title": "Broken build", "labels": ["ci"]}));
    }

    #[test]
    fn test_empty_post_data_sends_no_body() {
        let fwd = forwarder();
        for data in [json!({}), json!([]), json!(""), json!(42), Value::Null] {
            let outbound = fwd
                .prepare(&request(json!({
                    "apiPath": "/projects",
                    "method": "PUT",
                    "postData": data
                })))
                .unwrap();
            assert!(outbound.body.is_none());
        }
    }

    #[test]
    fn test_query_string_appended() {
        let outbound = forwarder()
            .prepare(&request(json!({
                "apiPath": "/projects",
                "queryParams": {"search": "my app", "owned": true, "page": null}
            })))
            .unwrap();
        assert_eq!(
            outbound.url.as_str(),
            "https://gitlab.example.com/api/v4/projects?search=my+app&owned=true"
        );
    }

    #[test]
    fn test_all_null_query_adds_no_question_mark() {
        let outbound = forwarder()
            .prepare(&request(json!({
                "apiPath": "/user",
                "queryParams": {"page": null}
            })))
            .unwrap();
        assert_eq!(outbound.url.as_str(), "https://gitlab.example.com/api/v4/user");
    }

    #[test]
    fn test_non_object_query_and_headers_ignored() {
        let outbound = forwarder()
            .prepare(&request(json!({
                "apiPath": "/user",
                "queryParams": [],
                "apiHeaders": []
            })))
            .unwrap();
        assert_eq!(outbound.url.as_str(), "https://gitlab.example.com/api/v4/user");
        assert_eq!(outbound.headers["private-token"], "glpat-test");
    }

    #[test]
    fn test_default_headers() {
        let outbound = forwarder().prepare(&ProxyRequest::new("/user")).unwrap();
        assert_eq!(outbound.headers["private-token"], "glpat-test");
        assert_eq!(outbound.headers[header::CONTENT_TYPE], "application/json");
    }

    #[test]
    fn test_caller_headers_override_defaults() {
        let outbound = forwarder()
            .prepare(&request(json!({
                "apiPath": "/user",
                "apiHeaders": {
                    "PRIVATE-TOKEN": "caller-token",
                    "content-type": "text/plain",
                    "X-Sudo": 12,
                    "X-Skip": null
                }
            })))
            .unwrap();

        assert_eq!(outbound.headers.get_all("private-token").iter().count(), 1);
        assert_eq!(outbound.headers["private-token"], "caller-token");
        assert_eq!(outbound.headers[header::CONTENT_TYPE], "text/plain");
        assert_eq!(outbound.headers["x-sudo"], "12");
        assert!(outbound.headers.get("x-skip").is_none());
    }

    #[test]
    fn test_invalid_header_rejected() {
        let err = forwarder()
            .prepare(&request(json!({
                "apiPath": "/user",
                "apiHeaders": {"bad header": "x"}
            })))
            .unwrap_err();
        assert!(matches!(err, ForwardError::InvalidHeader(name) if name == "bad header"));
    }

    #[test]
    fn test_unknown_method_rejected() {
        let err = forwarder()
            .prepare(&request(json!({"apiPath": "/user", "method": "BREW"})))
            .unwrap_err();
        assert!(matches!(err, ForwardError::UnsupportedMethod(m) if m == "BREW"));
    }

    #[test]
    fn test_method_case_normalized() {
        let outbound = forwarder()
            .prepare(&request(json!({"apiPath": "/user", "method": "delete"})))
            .unwrap();
        assert_eq!(outbound.method, Method::DELETE);
    }

    #[test]
    fn test_no_token_header_without_token() {
        let upstream = UpstreamConfig {
            base_url: "https://gitlab.example.com/api/v4".into(),
            ..UpstreamConfig::default()
        };
        let outbound = Forwarder::new(&upstream)
            .unwrap()
            .prepare(&ProxyRequest::new("/version"))
            .unwrap();
        assert!(outbound.headers.get("private-token").is_none());
    }

    #[test]
    fn test_invalid_base_url_is_internal_error() {
        let upstream = UpstreamConfig {
            base_url: "not a url".into(),
            ..UpstreamConfig::default()
        };
        let err = Forwarder::new(&upstream)
            .unwrap()
            .prepare(&ProxyRequest::new("/user"))
            .unwrap_err();
        assert!(matches!(err, ForwardError::InvalidUrl { .. }));
        assert_eq!(err.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_invalid_token_header_fails_setup() {
        let upstream = UpstreamConfig {
            token_header: "bad header".into(),
            ..UpstreamConfig::default()
        };
        assert!(matches!(
            Forwarder::new(&upstream),
            Err(SetupError::TokenHeader(_))
        ));
    }

    #[test]
    fn test_decode_details() {
        assert_eq!(decode_details(b""), Value::Null);
        assert_eq!(decode_details(br#"{"message":"x"}"#), json!({"message": "x"}));
        assert_eq!(decode_details(b"Bad Gateway"), json!("Bad Gateway"));
    }
}
