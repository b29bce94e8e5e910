//! Route handlers for the inbound surface.

use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

use crate::http::request::request_id;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::proxy::{ForwardError, ProxyRequest};

/// Body of the health endpoint.
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub message: &'static str,
}

/// `GET /` liveness probe.
pub async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        message: "GitLab Proxy Server is running",
    })
}

/// `POST /api/gitlabproxy`: forward one envelope upstream.
pub async fn gitlab_proxy(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<ProxyRequest>, JsonRejection>,
) -> Response {
    let start = Instant::now();
    let request_id = request_id(&headers);

    let request = match payload {
        Ok(Json(request)) => request,
        // No JSON body at all reads as an empty envelope.
        Err(JsonRejection::MissingJsonContentType(_)) => ProxyRequest::default(),
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            tracing::debug!(request_id = %request_id, "Rejected oversized envelope");
            return (rejection.status(), Json(json!({ "error": rejection.body_text() })))
                .into_response();
        }
        Err(rejection) => {
            let err = ForwardError::MalformedEnvelope(rejection.body_text());
            tracing::debug!(request_id = %request_id, error = %err, "Rejected malformed envelope");
            return err.into_response();
        }
    };

    let method = method_label(request.method.as_deref());
    let api_path = request.api_path.clone().unwrap_or_default();

    tracing::debug!(
        request_id = %request_id,
        method = method,
        api_path = %api_path,
        "Proxying GitLab request"
    );

    let response = match state.forwarder.forward(request).await {
        Ok(reply) => {
            tracing::debug!(
                request_id = %request_id,
                api_path = %api_path,
                status = %reply.status,
                "Upstream responded"
            );
            reply.into_response()
        }
        Err(err) => {
            log_failure(&request_id, &api_path, &err);
            err.into_response()
        }
    };

    metrics::record_request(method, response.status().as_u16(), start);
    response
}

fn log_failure(request_id: &str, api_path: &str, err: &ForwardError) {
    if err.is_validation() {
        tracing::debug!(request_id = %request_id, error = %err, "Rejected proxy request");
        return;
    }

    match err {
        ForwardError::Upstream { status, .. } => {
            tracing::warn!(request_id = %request_id, api_path = %api_path, status = %status, "Error from GitLab API");
        }
        _ => {
            tracing::error!(request_id = %request_id, api_path = %api_path, error = %err, "Error proxying GitLab request");
        }
    }
}

/// Bounded metric label for the envelope's verb.
fn method_label(raw: Option<&str>) -> &'static str {
    match raw.map(|m| m.trim().to_ascii_uppercase()).as_deref() {
        None | Some("") | Some("GET") => "GET",
        Some("POST") => "POST",
        Some("PUT") => "PUT",
        Some("PATCH") => "PATCH",
        Some("DELETE") => "DELETE",
        Some("HEAD") => "HEAD",
        Some("OPTIONS") => "OPTIONS",
        Some(_) => "OTHER",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_label() {
        assert_eq!(method_label(None), "GET");
        assert_eq!(method_label(Some("patch")), "PATCH");
        assert_eq!(method_label(Some("BREW")), "OTHER");
    }

    #[tokio::test]
    async fn test_health_message() {
        let Json(status) = health().await;
        assert_eq!(status.message, "GitLab Proxy Server is running");
    }
}
