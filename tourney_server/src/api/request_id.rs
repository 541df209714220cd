//! Request correlation and per-request metrics.
//!
//! Every request carries an `x-request-id`. A caller-supplied ID is kept when
//! it is short and printable, otherwise a fresh UUID replaces it. The ID is
//! echoed on the response and handed to handlers through [`RequestId`], so
//! organizer commands can be traced back to the HTTP call that issued them.

use axum::{
    extract::{FromRequestParts, Request},
    http::{HeaderMap, HeaderValue, StatusCode, request::Parts},
    middleware::Next,
    response::Response,
};
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::{logging, metrics};

/// Header name for request ID
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest caller-supplied ID that is kept as is
const MAX_REQUEST_ID_LEN: usize = 128;

/// Correlation ID of the current request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestId(pub String);

impl RequestId {
    /// Reuse the caller's ID when it is usable, otherwise mint a new one
    fn from_headers(headers: &HeaderMap) -> Self {
        let supplied = headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|id| {
                !id.is_empty()
                    && id.len() <= MAX_REQUEST_ID_LEN
                    && id.chars().all(|c| c.is_ascii_graphic())
            });

        match supplied {
            Some(id) => RequestId(id.to_string()),
            None => RequestId(Uuid::new_v4().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<RequestId>().cloned().ok_or((
            StatusCode::INTERNAL_SERVER_ERROR,
            "Request ID not found in extensions",
        ))
    }
}

/// Tag the request with a [`RequestId`], echo it on the response and record
/// the request in metrics and logs.
///
/// # Example
///
/// ```no_run
/// use axum::{Router, routing::get, middleware};
/// use tourney_server::api::request_id::request_id_middleware;
///
/// let app: Router = Router::new()
///     .route("/", get(|| async { "Hello" }))
///     .layer(middleware::from_fn(request_id_middleware));
/// ```
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = RequestId::from_headers(request.headers());
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    tracing::debug!(request_id = %request_id.as_str(), %method, %path, "Request started");
    request.extensions_mut().insert(request_id.clone());

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    record(&method, &path, response.status(), started.elapsed());
    tracing::info!(
        request_id = %request_id.as_str(),
        status = %response.status(),
        "Request completed"
    );

    response
}

fn record(method: &str, path: &str, status: StatusCode, elapsed: Duration) {
    let code = status.as_u16();
    metrics::http_requests_total(method, path, code);
    metrics::http_request_duration_ms(method, path, elapsed.as_secs_f64() * 1000.0);
    if status.is_client_error() || status.is_server_error() {
        metrics::commands_rejected_total(code);
    }
    logging::log_api_request(method, path, code, elapsed.as_millis() as u64);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with(id: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_str(id).unwrap());
        headers
    }

    #[test]
    fn test_caller_id_is_kept() {
        let id = RequestId::from_headers(&headers_with("test-id-123"));
        assert_eq!(id.as_str(), "test-id-123");
    }

    #[test]
    fn test_missing_id_is_generated() {
        let id = RequestId::from_headers(&HeaderMap::new());
        assert!(Uuid::parse_str(id.as_str()).is_ok());
    }

    #[test]
    fn test_unusable_ids_are_replaced() {
        let long = "x".repeat(MAX_REQUEST_ID_LEN + 1);
        for bad in ["", "   ", "has space", long.as_str()] {
            let id = RequestId::from_headers(&headers_with(bad));
            assert!(Uuid::parse_str(id.as_str()).is_ok(), "kept {bad:?}");
        }
    }
}
