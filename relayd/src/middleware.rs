use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use relay::Config;

/// Name of the key a request authenticated with, attached to the response
/// extensions so [`log_requests`] can report it.
#[derive(Debug, Clone)]
pub struct ApiKeyName(pub String);

/// Enforce API-key auth on `/v1` routes.
///
/// The key may arrive as `Authorization: Bearer <key>`, `api-key` or
/// `x-api-key`. With auth disabled in the configuration every request
/// passes.
pub async fn require_api_key(cfg: Arc<Config>, req: Request, next: Next) -> Response {
    if !cfg.is_auth_enabled() {
        return next.run(req).await;
    }

    let Some(key) = extract_api_key(req.headers()) else {
        tracing::warn!(path = %req.uri().path(), "missing api key");
        return unauthorized(
            "Missing API key. Please include your API key in the Authorization \
             header using Bearer scheme, or in the api-key/x-api-key header.",
            "missing_api_key",
        );
    };

    match cfg.validate_api_key(&key) {
        Some(name) => {
            let name = ApiKeyName(name.to_string());
            let mut resp = next.run(req).await;
            resp.extensions_mut().insert(name);
            resp
        }
        None => {
            // Only the key prefix goes to the log.
            tracing::warn!(
                path = %req.uri().path(),
                masked_key = %mask_key(&key),
                "invalid api key"
            );
            unauthorized("Invalid API key provided.", "invalid_api_key")
        }
    }
}

/// One structured log line per request with status, latency and, when the
/// request authenticated, the name of the key it used.
pub async fn log_requests(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let resp = next.run(req).await;

    let key_name = resp
        .extensions()
        .get::<ApiKeyName>()
        .map(|k| k.0.as_str())
        .unwrap_or("");
    tracing::info!(
        status = resp.status().as_u16(),
        %method,
        %path,
        key_name,
        latency_ms = start.elapsed().as_millis() as u64,
        "request"
    );
    resp
}

fn extract_api_key(headers: &HeaderMap) -> Option<String> {
    if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        if let Some(key) = auth.strip_prefix("Bearer ") {
            return Some(key.to_string());
        }
    }
    for header in ["api-key", "x-api-key"] {
        if let Some(key) = headers.get(header).and_then(|v| v.to_str().ok()) {
            if !key.is_empty() {
                return Some(key.to_string());
            }
        }
    }
    None
}

/// Keep only the first 8 characters of a key for logging.
fn mask_key(key: &str) -> String {
    if key.chars().count() <= 8 {
        "***".to_string()
    } else {
        format!("{}***", key.chars().take(8).collect::<String>())
    }
}

fn unauthorized(message: &str, code: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "error": {
                "message": message,
                "type": "invalid_request_error",
                "code": code,
            }
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(
                axum::http::HeaderName::from_bytes(k.as_bytes()).unwrap(),
                HeaderValue::from_str(v).unwrap(),
            );
        }
        map
    }

    #[test]
    fn bearer_takes_precedence() {
        let h = headers(&[("authorization", "Bearer sk-a"), ("api-key", "sk-b")]);
        assert_eq!(extract_api_key(&h).as_deref(), Some("sk-a"));
    }

    #[test]
    fn falls_back_to_api_key_headers() {
        let h = headers(&[("api-key", "sk-b")]);
        assert_eq!(extract_api_key(&h).as_deref(), Some("sk-b"));
        let h = headers(&[("x-api-key", "sk-c")]);
        assert_eq!(extract_api_key(&h).as_deref(), Some("sk-c"));
    }

    #[test]
    fn non_bearer_authorization_is_ignored() {
        let h = headers(&[("authorization", "Basic abc")]);
        assert_eq!(extract_api_key(&h), None);
    }

    #[test]
    fn masks_all_but_prefix() {
        assert_eq!(mask_key("sk-1234567890"), "sk-12345***");
        assert_eq!(mask_key("short"), "***");
    }
}
