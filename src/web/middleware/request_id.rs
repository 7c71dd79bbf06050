//! # Request ID Middleware
//!
//! Tags each request with an id for tracing and error bodies, and reports
//! server-side processing time.

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::constants::{PROCESSING_TIME_HEADER, REQUEST_ID_HEADER};

/// Longest client-supplied id that is honoured
const MAX_REQUEST_ID_LEN: usize = 128;

/// Add request ID middleware
///
/// Reuses a well-formed incoming `X-Request-ID`, otherwise generates a UUID.
/// The id is stored in request extensions, recorded on a tracing span and
/// echoed in the response headers along with `X-Processing-Time-Ms`.
pub async fn add_request_id(mut request: Request, next: Next) -> Response {
    let start = Instant::now();
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|id| is_acceptable(id))
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let span = tracing::info_span!(
        "http_request",
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
    );
    let mut response = next.run(request).instrument(span).await;

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        headers.insert(REQUEST_ID_HEADER, value);
    }
    headers.insert(
        PROCESSING_TIME_HEADER,
        HeaderValue::from(start.elapsed().as_millis() as u64),
    );

    response
}

fn is_acceptable(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_REQUEST_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
}

/// Request ID wrapper for extension storage
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

impl RequestId {
    /// Get the request ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
