use axum::{
    body::{to_bytes, Body, Bytes},
    http::{header::CONTENT_LENGTH, Request},
    middleware::Next,
    response::Response,
    Error as AxumError,
};
use std::time::Instant;

const MAX_BUFFERED_BODY_BYTES: usize = 64 * 1024;
const MAX_LOGGED_BODY_BYTES: usize = 2048;

/// Logs every 4xx/5xx response together with a preview of its body.
///
/// Only the request path is recorded. Query strings can carry authorization
/// codes, so they never reach the log.
pub async fn log_error_responses(req: Request<Body>, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(req).await;
    let status = response.status();

    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }

    let latency_ms = start.elapsed().as_millis() as u64;
    let (mut parts, body) = response.into_parts();
    match buffer_body(body).await {
        Ok((bytes, preview)) => {
            log_error_event(status.as_u16(), &method, &path, latency_ms, &preview, None);
            Response::from_parts(parts, Body::from(bytes))
        }
        Err(err) => {
            parts.headers.remove(CONTENT_LENGTH);
            log_error_event(status.as_u16(), &method, &path, latency_ms, "", Some(err));
            Response::from_parts(parts, Body::empty())
        }
    }
}

async fn buffer_body(body: Body) -> Result<(Bytes, String), AxumError> {
    let bytes = to_bytes(body, MAX_BUFFERED_BODY_BYTES).await?;
    let preview = if bytes.len() > MAX_LOGGED_BODY_BYTES {
        let slice = bytes.slice(0..MAX_LOGGED_BODY_BYTES);
        format!(
            "{}... (truncated, {} bytes total)",
            String::from_utf8_lossy(&slice),
            bytes.len()
        )
    } else {
        String::from_utf8_lossy(&bytes).to_string()
    };
    Ok((bytes, preview))
}

fn log_error_event(
    status: u16,
    method: &str,
    path: &str,
    latency_ms: u64,
    body_preview: &str,
    body_error: Option<AxumError>,
) {
    match (status >= 500, body_error) {
        (true, Some(err)) => tracing::error!(
            status,
            method,
            path,
            latency_ms,
            error = ?err,
            "Failed to read error response body"
        ),
        (false, Some(err)) => tracing::warn!(
            status,
            method,
            path,
            latency_ms,
            error = ?err,
            "Failed to read error response body"
        ),
        (true, None) => tracing::error!(
            status,
            method,
            path,
            latency_ms,
            body = body_preview,
            "Request completed with error status"
        ),
        (false, None) => tracing::warn!(
            status,
            method,
            path,
            latency_ms,
            body = body_preview,
            "Request completed with error status"
        ),
    }
}
