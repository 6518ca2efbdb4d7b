use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::extract::Request;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use relay::{transform, Backend, Balancer, Config};

use crate::middleware;

/// Request bodies beyond this are rejected with 413.
const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Which OpenAI-compatible surface a request targets.
#[derive(Debug, Clone, Copy)]
enum ApiKind {
    ChatCompletions,
    Embeddings,
    Responses,
}

impl ApiKind {
    fn path(self) -> &'static str {
        match self {
            ApiKind::ChatCompletions => "chat/completions",
            ApiKind::Embeddings => "embeddings",
            ApiKind::Responses => "responses",
        }
    }
}

/// The relay itself: picks a backend per request and forwards.
pub struct ProxyService {
    config: Arc<Config>,
    balancer: Arc<Balancer>,
    http: reqwest::Client,
}

impl ProxyService {
    pub fn new(config: Arc<Config>, balancer: Arc<Balancer>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.retry.timeout())
            .build()?;
        Ok(Self {
            config,
            balancer,
            http,
        })
    }

    /// Build the router: `/health` plus the authenticated `/v1` surface.
    pub fn router(self: Arc<Self>) -> Router {
        let chat = self.clone();
        let embed = self.clone();
        let responses = self.clone();
        let cfg = self.config.clone();

        let v1 = Router::new()
            .route(
                "/v1/chat/completions",
                post(move |req: Request| chat.clone().relay(req, ApiKind::ChatCompletions)),
            )
            .route(
                "/v1/embeddings",
                post(move |req: Request| embed.clone().relay(req, ApiKind::Embeddings)),
            )
            .route(
                "/v1/responses",
                post(move |req: Request| responses.clone().relay(req, ApiKind::Responses)),
            )
            .layer(axum::middleware::from_fn(
                move |req: Request, next: axum::middleware::Next| {
                    middleware::require_api_key(cfg.clone(), req, next)
                },
            ));

        Router::new()
            .route("/health", get(health))
            .merge(v1)
            .layer(axum::middleware::from_fn(middleware::log_requests))
    }

    async fn relay(self: Arc<Self>, req: Request, kind: ApiKind) -> Response {
        let (parts, body) = req.into_parts();
        let body = match to_bytes(body, MAX_BODY_SIZE).await {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read request body");
                return error_json(StatusCode::PAYLOAD_TOO_LARGE, "request body too large");
            }
        };

        let Some(model) = transform::extract_model(&body) else {
            tracing::warn!("model field is missing from request body");
            return error_json(StatusCode::BAD_REQUEST, "model field is required");
        };
        if !self.balancer.has_model(&model) {
            tracing::warn!(%model, "model not configured");
            return error_json(
                StatusCode::BAD_REQUEST,
                format!("model {model} is not configured"),
            );
        }

        let body = transform::transform_body(body.to_vec());
        self.forward(&parts.headers, &model, body, kind).await
    }

    /// Try backends in failover order until one answers.
    async fn forward(
        &self,
        headers: &HeaderMap,
        model: &str,
        body: Vec<u8>,
        kind: ApiKind,
    ) -> Response {
        let slots = self.balancer.failover_order(model);
        if slots.is_empty() {
            tracing::error!(%model, "no backends available");
            return error_json(StatusCode::SERVICE_UNAVAILABLE, "no backends available");
        }

        let attempts = (self.config.retry.max_attempts as usize)
            .min(slots.len())
            .max(1);
        let mut last_err = String::new();

        for slot in slots.iter().take(attempts) {
            let backend = slot.backend();
            let url = target_url(backend, kind);
            tracing::debug!(%model, %url, "forwarding request");

            let mut builder = self.http.post(&url);
            // `header` appends rather than replaces, so anything set
            // explicitly below must be skipped here. The client's own
            // credentials stay at the relay; the backend gets its key only.
            for (name, value) in headers {
                if name == header::HOST
                    || name == header::CONTENT_LENGTH
                    || name == header::CONTENT_TYPE
                    || name == header::AUTHORIZATION
                    || name.as_str() == "api-key"
                    || name.as_str() == "x-api-key"
                {
                    continue;
                }
                builder = builder.header(name.clone(), value.clone());
            }
            let result = builder
                .header("api-key", &backend.api_key)
                .header(header::CONTENT_TYPE, "application/json")
                .body(body.clone())
                .send()
                .await;

            match result {
                Err(e) => {
                    tracing::warn!(%url, error = %e, "backend request failed");
                    slot.mark_unhealthy();
                    last_err = e.to_string();
                }
                Ok(resp) if resp.status().is_server_error() => {
                    let status = resp.status();
                    let detail = resp.text().await.unwrap_or_default();
                    tracing::warn!(%url, %status, %detail, "backend returned server error");
                    slot.mark_unhealthy();
                    last_err = format!("backend returned status {status}");
                }
                Ok(resp) => {
                    slot.mark_healthy();
                    return relay_response(resp).await;
                }
            }
        }

        tracing::error!(%model, %last_err, "all backends failed");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "all backends failed", "detail": last_err })),
        )
            .into_response()
    }
}

/// Pass an upstream response back to the client.
///
/// Event streams are forwarded chunk by chunk as they arrive; everything
/// else is relayed whole with the upstream status and headers.
async fn relay_response(resp: reqwest::Response) -> Response {
    let status = resp.status();
    let headers = resp.headers().clone();
    let is_stream = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("text/event-stream"))
        .unwrap_or(false);

    if is_stream {
        return Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, "text/event-stream")
            .header(header::CACHE_CONTROL, "no-cache")
            .body(Body::from_stream(resp.bytes_stream()))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response());
    }

    match resp.bytes().await {
        Ok(bytes) => {
            let mut builder = Response::builder().status(status);
            for (name, value) in &headers {
                if name == header::TRANSFER_ENCODING
                    || name == header::CONNECTION
                    || name == header::CONTENT_LENGTH
                {
                    continue;
                }
                builder = builder.header(name.clone(), value.clone());
            }
            builder
                .body(Body::from(bytes))
                .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to read backend response");
            error_json(StatusCode::INTERNAL_SERVER_ERROR, "failed to read response")
        }
    }
}

/// Azure OpenAI target for a backend and API surface.
fn target_url(backend: &Backend, kind: ApiKind) -> String {
    let endpoint = backend.endpoint.trim_end_matches('/');
    let version = backend.api_version();
    match kind {
        ApiKind::Responses => format!("{endpoint}/openai/responses?api-version={version}"),
        _ => format!(
            "{endpoint}/openai/deployments/{}/{}?api-version={version}",
            backend.deployment,
            kind.path()
        ),
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Local::now().to_rfc3339(),
    }))
}

fn error_json(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}
