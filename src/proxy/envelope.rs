//! Inbound and outbound envelope types.

use axum::body::Bytes;
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::proxy::error::ForwardError;

/// Generic description of an upstream API call, as posted by the caller.
///
/// JSON `null` in any optional field behaves like the field being absent.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRequest {
    /// Path appended to the upstream base URL, e.g. `/projects/42/issues`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_path: Option<String>,

    /// Flat query parameter map. Insertion order is preserved; anything
    /// other than an object contributes no parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_params: Option<Value>,

    /// Payload sent as the JSON body for non-GET methods.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_data: Option<Value>,

    /// HTTP verb, `GET` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    /// Extra headers, applied over the defaults. Non-object values are ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_headers: Option<Value>,
}

impl ProxyRequest {
    /// Shorthand for a request targeting `api_path` with everything else defaulted.
    pub fn new(api_path: impl Into<String>) -> Self {
        Self {
            api_path: Some(api_path.into()),
            ..Self::default()
        }
    }

    /// `queryParams` entries, if it was sent as an object.
    pub fn query_entries(&self) -> Option<&Map<String, Value>> {
        self.query_params.as_ref().and_then(Value::as_object)
    }

    /// `apiHeaders` entries, if it was sent as an object.
    pub fn header_entries(&self) -> Option<&Map<String, Value>> {
        self.api_headers.as_ref().and_then(Value::as_object)
    }
}

/// A fully translated upstream request, built without any I/O.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: url::Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

/// Successful upstream reply, relayed to the caller unchanged.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    /// Upstream `Content-Type`, if it sent one.
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl IntoResponse for UpstreamResponse {
    fn into_response(self) -> Response {
        let content_type = self
            .content_type
            .unwrap_or_else(|| "application/json".to_string());
        (self.status, [(header::CONTENT_TYPE, content_type)], self.body).into_response()
    }
}

/// Outcome of one forwarded call: a success envelope or one of the error kinds.
pub type ProxyResponse = Result<UpstreamResponse, ForwardError>;
