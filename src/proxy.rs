//! Development request proxy.
//!
//! Forwards same-origin requests under a prefix (default `/api`) to the
//! backend origin, so a locally served UI can talk to the API without CORS.
//! Production traffic goes to the backend directly and never hits this.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | any    | `{prefix}/{*path}` | Forward to `{backend_url}/{path}?{query}` |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Forwarding rules
//!
//! - Request headers: only [`REQUEST_HEADERS`] are forwarded.
//! - Response headers: only [`RESPONSE_HEADERS`] are copied back; every
//!   `Set-Cookie` is kept.
//! - JSON request bodies pass through as text. Multipart bodies are parsed
//!   and rebuilt, and the client's `Content-Type` is dropped so the outbound
//!   request carries its own boundary. Any other body passes through
//!   unchanged.
//! - The upstream path is taken from the raw request path, so percent
//!   escapes reach the backend unchanged.
//! - Text and JSON responses are read as text; every other type (PDF,
//!   octet-stream, images, archives) passes through as raw bytes. Status
//!   codes are preserved.
//! - If the backend cannot be reached the proxy answers `503` with
//!   `{"detail": "Failed to connect to backend server"}`, whatever the method.

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, FromRequest, Multipart, Request, State},
    http::{header, HeaderMap, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::config::{Config, ProxyConfig};

/// Request headers forwarded to the backend.
pub const REQUEST_HEADERS: &[&str] = &["content-type", "authorization", "cookie", "x-request-id"];

/// Response headers copied back to the client.
pub const RESPONSE_HEADERS: &[&str] = &["content-type", "set-cookie", "cache-control", "x-request-id"];

/// Body returned when the backend is unreachable.
pub const CONNECT_FAILURE_DETAIL: &str = "Failed to connect to backend server";

/// Upload ceiling, matching the backend's 50 MB request limit.
pub const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

struct ProxyState {
    http: reqwest::Client,
    backend_url: String,
    prefix: String,
}

#[derive(Serialize)]
struct DetailBody {
    detail: String,
}

fn detail_response(status: StatusCode, detail: impl Into<String>) -> Response {
    (
        status,
        Json(DetailBody {
            detail: detail.into(),
        }),
    )
        .into_response()
}

/// Binds `[proxy].bind` and serves until the process ends.
pub async fn run_proxy(config: &Config) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&config.proxy.bind).await?;
    serve_proxy(listener, &config.proxy).await
}

/// Serves the proxy on an already bound listener.
pub async fn serve_proxy(listener: TcpListener, config: &ProxyConfig) -> anyhow::Result<()> {
    let app = build_router(config)?;
    info!(
        addr = %listener.local_addr()?,
        prefix = %config.prefix,
        backend = %config.backend_url,
        "proxy listening"
    );
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn build_router(config: &ProxyConfig) -> anyhow::Result<Router> {
    let http = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()?;
    let prefix = config.prefix.trim_end_matches('/').to_string();
    let route = format!("{}/{{*path}}", prefix);
    let state = Arc::new(ProxyState {
        http,
        backend_url: config.backend_url.trim_end_matches('/').to_string(),
        prefix,
    });

    let router = Router::new()
        .route("/health", get(handle_health))
        .route(&route, any(handle_proxy))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state);
    Ok(router)
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Json,
    Multipart,
    Raw,
}

fn body_kind(headers: &HeaderMap) -> BodyKind {
    let ct = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();
    if ct.starts_with("application/json") {
        BodyKind::Json
    } else if ct.starts_with("multipart/form-data") {
        BodyKind::Multipart
    } else {
        BodyKind::Raw
    }
}

/// Whether a response body is text that can be re-encoded safely. Anything
/// else, including PDF and octet-stream, passes through as raw bytes.
fn is_text(content_type: &str) -> bool {
    let ct = content_type.to_ascii_lowercase();
    let essence = ct.split(';').next().unwrap_or("").trim();
    essence.starts_with("text/")
        || essence.ends_with("+json")
        || essence.ends_with("+xml")
        || matches!(
            essence,
            "application/json" | "application/xml" | "application/javascript"
        )
}

/// The still-encoded upstream path: the request path with the mount prefix
/// removed. Percent escapes such as `%2F` and `%3F` are kept as sent.
fn upstream_path<'a>(raw_path: &'a str, prefix: &str) -> &'a str {
    raw_path
        .strip_prefix(prefix)
        .unwrap_or(raw_path)
        .trim_start_matches('/')
}

fn target_url(backend: &str, path: &str, query: Option<&str>) -> String {
    let mut url = format!("{}/{}", backend, path.trim_start_matches('/'));
    if let Some(q) = query.filter(|q| !q.is_empty()) {
        url.push('?');
        url.push_str(q);
    }
    url
}

/// Copies allow-listed headers, keeping repeated values.
fn copy_allowed(from: &HeaderMap, to: &mut HeaderMap, allowed: &[&str], skip: Option<&HeaderName>) {
    for name in allowed {
        let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
            continue;
        };
        if skip == Some(&name) {
            continue;
        }
        for value in from.get_all(&name) {
            to.append(name.clone(), value.clone());
        }
    }
}

async fn handle_proxy(State(state): State<Arc<ProxyState>>, req: Request) -> Response {
    let method = req.method().clone();
    let path = upstream_path(req.uri().path(), &state.prefix);
    let url = target_url(&state.backend_url, path, req.uri().query());
    let kind = body_kind(req.headers());

    let mut headers = HeaderMap::new();
    let skip = (kind == BodyKind::Multipart).then_some(header::CONTENT_TYPE);
    copy_allowed(req.headers(), &mut headers, REQUEST_HEADERS, skip.as_ref());

    let mut outbound = state.http.request(method.clone(), &url).headers(headers);

    match kind {
        BodyKind::Multipart => match rebuild_multipart(req).await {
            Ok(form) => outbound = outbound.multipart(form),
            Err(resp) => return resp,
        },
        BodyKind::Json => match axum::body::to_bytes(req.into_body(), MAX_BODY_BYTES).await {
            Ok(bytes) if !bytes.is_empty() => {
                outbound = outbound.body(String::from_utf8_lossy(&bytes).into_owned());
            }
            Ok(_) => {}
            Err(e) => return detail_response(StatusCode::PAYLOAD_TOO_LARGE, e.to_string()),
        },
        BodyKind::Raw => match axum::body::to_bytes(req.into_body(), MAX_BODY_BYTES).await {
            Ok(bytes) if !bytes.is_empty() => outbound = outbound.body(bytes),
            Ok(_) => {}
            Err(e) => return detail_response(StatusCode::PAYLOAD_TOO_LARGE, e.to_string()),
        },
    }

    let upstream = match outbound.send().await {
        Ok(resp) => resp,
        Err(e) => {
            warn!(%method, %url, error = %e, "backend unreachable");
            return detail_response(StatusCode::SERVICE_UNAVAILABLE, CONNECT_FAILURE_DETAIL);
        }
    };

    let status = upstream.status();
    debug!(%method, %url, status = status.as_u16(), "proxied");

    let mut out_headers = HeaderMap::new();
    copy_allowed(upstream.headers(), &mut out_headers, RESPONSE_HEADERS, None);

    let content_type = upstream
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let body = if is_text(&content_type) {
        upstream.text().await.map(Body::from)
    } else {
        upstream.bytes().await.map(Body::from)
    };
    let body = match body {
        Ok(b) => b,
        Err(e) => {
            warn!(%url, error = %e, "backend response body failed");
            return detail_response(StatusCode::SERVICE_UNAVAILABLE, CONNECT_FAILURE_DETAIL);
        }
    };

    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = out_headers;
    response
}

/// Parses an incoming multipart body and rebuilds it as an outbound form.
async fn rebuild_multipart(req: Request) -> Result<reqwest::multipart::Form, Response> {
    let mut multipart = Multipart::from_request(req, &())
        .await
        .map_err(|e| detail_response(StatusCode::BAD_REQUEST, e.body_text()))?;

    let mut form = reqwest::multipart::Form::new();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(detail_response(e.status(), e.body_text())),
        };

        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| detail_response(e.status(), e.body_text()))?;

        let mut part = reqwest::multipart::Part::bytes(data.to_vec());
        if let Some(f) = file_name {
            part = part.file_name(f);
        }
        if let Some(ct) = content_type {
            part = part
                .mime_str(&ct)
                .map_err(|e| detail_response(StatusCode::BAD_REQUEST, e.to_string()))?;
        }
        form = form.part(name, part);
    }
    Ok(form)
}
