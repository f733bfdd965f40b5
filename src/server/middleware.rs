// Middleware for admission control and security headers

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderName, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;

use super::TelemetryServer;

pub const RATE_LIMIT_LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// Fixed headers attached to every response
pub const SECURITY_HEADERS: [(&str, &str); 7] = [
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
    ("x-xss-protection", "1; mode=block"),
    ("strict-transport-security", "max-age=31536000; includeSubDomains"),
    (
        "content-security-policy",
        "default-src 'self'; script-src 'self' 'unsafe-inline' https://cdn.jsdelivr.net; style-src 'self' 'unsafe-inline'",
    ),
    ("referrer-policy", "strict-origin-when-cross-origin"),
    ("permissions-policy", "geolocation=(), microphone=(), camera=()"),
];

/// Identify the caller: peer IP, else first X-Forwarded-For entry, else "unknown"
pub fn client_id(request: &Request<Body>) -> String {
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Rate limiting middleware: 429 when the client's window is full
pub async fn rate_limit_middleware(
    State(server): State<Arc<TelemetryServer>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let client = client_id(&request);
    let limiter = server.rate_limiter();
    let admission = limiter.allow(&client);

    if !admission.allowed {
        let body = serde_json::json!({
            "success": false,
            "error": "Rate limit exceeded. Try again in 1 minute."
        });
        let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
        let headers = response.headers_mut();
        headers.insert(RATE_LIMIT_LIMIT_HEADER, HeaderValue::from(limiter.max_requests()));
        headers.insert(RATE_LIMIT_REMAINING_HEADER, HeaderValue::from(0usize));
        headers.insert(header::RETRY_AFTER, HeaderValue::from(limiter.window().as_secs()));
        return response;
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(RATE_LIMIT_LIMIT_HEADER, HeaderValue::from(limiter.max_requests()));
    headers.insert(RATE_LIMIT_REMAINING_HEADER, HeaderValue::from(admission.remaining));
    response
}

/// Attach the fixed security headers
pub async fn security_headers_middleware(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    for (name, value) in SECURITY_HEADERS {
        headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_id_from_forwarded_header() {
        let request = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_id(&request), "203.0.113.7");
    }

    #[test]
    fn test_client_id_prefers_peer_address() {
        let mut request = Request::builder()
            .header("x-forwarded-for", "203.0.113.7")
            .body(Body::empty())
            .unwrap();
        let peer: SocketAddr = "198.51.100.2:50000".parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(peer));
        assert_eq!(client_id(&request), "198.51.100.2");
    }

    #[test]
    fn test_client_id_unknown() {
        let request = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_id(&request), "unknown");
    }

    #[test]
    fn test_security_header_names_are_valid() {
        for (name, value) in SECURITY_HEADERS {
            HeaderName::from_static(name);
            HeaderValue::from_static(value);
        }
    }
}
