//! Integration tests for the development proxy.
//!
//! A fake backend records what the proxy forwards; a plain `reqwest` client
//! plays the browser.

use analystos::config::ProxyConfig;
use analystos::proxy::{serve_proxy, CONNECT_FAILURE_DETAIL};
use axum::{
    body::Bytes,
    extract::{Multipart, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

const PDF_BYTES: &[u8] = b"%PDF-1.4\n\x00\xff\xfe binary \x80\x81\n%%EOF";
const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR\xff\xd8\xc3";

#[derive(Default)]
struct Seen {
    headers: Mutex<Vec<HeaderMap>>,
    uri: Mutex<Vec<String>>,
    parts: Mutex<Vec<(String, Option<String>, Option<String>, Vec<u8>)>>,
    body: Mutex<Vec<Vec<u8>>>,
}

type Shared = Arc<Seen>;

async fn echo(State(seen): State<Shared>, uri: axum::http::Uri, headers: HeaderMap, body: Bytes) -> Response {
    seen.headers.lock().unwrap().push(headers);
    seen.uri.lock().unwrap().push(uri.to_string());
    seen.body.lock().unwrap().push(body.to_vec());
    (
        StatusCode::CREATED,
        [
            ("x-internal-trace", "do-not-leak"),
            ("cache-control", "no-store"),
            ("x-request-id", "backend-id"),
        ],
        Json(json!({ "ok": true })),
    )
        .into_response()
}

async fn cookies(State(seen): State<Shared>, headers: HeaderMap) -> Response {
    seen.headers.lock().unwrap().push(headers);
    let mut resp = Json(json!({ "access_token": "t", "expires_in": 900 })).into_response();
    let h = resp.headers_mut();
    h.append(header::SET_COOKIE, "refresh_token=r1; HttpOnly; Path=/auth".parse().unwrap());
    h.append(header::SET_COOKIE, "csrf=c1; Path=/".parse().unwrap());
    resp
}

async fn upload(State(seen): State<Shared>, headers: HeaderMap, mut multipart: Multipart) -> Response {
    seen.headers.lock().unwrap().push(headers);
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.unwrap().to_vec();
        seen.parts.lock().unwrap().push((name, file_name, content_type, data));
    }
    Json(json!({ "job_id": "j1", "filenames": [], "message": "queued" })).into_response()
}

async fn pdf() -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/pdf")],
        PDF_BYTES,
    )
        .into_response()
}

async fn png() -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "image/png")],
        PNG_BYTES,
    )
        .into_response()
}

async fn missing() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "detail": "Report not found" })),
    )
        .into_response()
}

async fn start_backend() -> (String, Shared) {
    let seen: Shared = Arc::new(Seen::default());
    let app = Router::new()
        .route("/research/scrape", post(echo))
        .route("/research/reports", get(echo))
        .route("/raw", post(echo))
        .route("/auth/login", post(cookies))
        .route("/research/upload", post(upload))
        .route("/research/reports/r1/download", get(pdf))
        .route("/research/reports/missing", get(missing))
        .route("/charts/btc.png", get(png))
        .fallback(echo)
        .with_state(seen.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), seen)
}

async fn start_proxy(backend_url: &str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let config = ProxyConfig {
        bind: addr.to_string(),
        backend_url: backend_url.to_string(),
        prefix: "/api".to_string(),
    };
    tokio::spawn(async move {
        serve_proxy(listener, &config).await.unwrap();
    });
    format!("http://{}", addr)
}

/// A backend URL nothing listens on.
async fn dead_backend() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

#[tokio::test]
async fn json_body_and_allowed_headers_are_forwarded() {
    let (backend, seen) = start_backend().await;
    let proxy = start_proxy(&backend).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/api/research/scrape", proxy))
        .header("authorization", "Bearer abc")
        .header("cookie", "refresh_token=r1")
        .header("x-request-id", "client-id")
        .header("x-forwarded-secret", "nope")
        .json(&json!({ "urls": ["https://example.com"] }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(resp.headers()["cache-control"], "no-store");
    assert_eq!(resp.headers()["x-request-id"], "backend-id");
    assert!(resp.headers().get("x-internal-trace").is_none());

    let headers = seen.headers.lock().unwrap()[0].clone();
    assert_eq!(headers["authorization"], "Bearer abc");
    assert_eq!(headers["cookie"], "refresh_token=r1");
    assert_eq!(headers["x-request-id"], "client-id");
    assert!(headers["content-type"]
        .to_str()
        .unwrap()
        .starts_with("application/json"));
    assert!(headers.get("x-forwarded-secret").is_none());

    let body: Value = serde_json::from_slice(&seen.body.lock().unwrap()[0]).unwrap();
    assert_eq!(body, json!({ "urls": ["https://example.com"] }));
}

#[tokio::test]
async fn query_string_is_preserved() {
    let (backend, seen) = start_backend().await;
    let proxy = start_proxy(&backend).await;

    let resp = reqwest::get(format!("{}/api/research/reports?page=2&page_size=5", proxy))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(
        seen.uri.lock().unwrap()[0],
        "/research/reports?page=2&page_size=5"
    );
}

#[tokio::test]
async fn encoded_path_is_forwarded_verbatim() {
    let (backend, seen) = start_backend().await;
    let proxy = start_proxy(&backend).await;
    let client = reqwest::Client::new();

    for path in [
        "/research/jobs/x%3Fadmin=1",
        "/research/reports/a%2Fb",
        "/research/jobs/a%20b",
    ] {
        client
            .get(format!("{}/api{}", proxy, path))
            .send()
            .await
            .unwrap();
    }

    assert_eq!(
        *seen.uri.lock().unwrap(),
        vec![
            "/research/jobs/x%3Fadmin=1".to_string(),
            "/research/reports/a%2Fb".to_string(),
            "/research/jobs/a%20b".to_string(),
        ]
    );
}

#[tokio::test]
async fn encoded_path_keeps_real_query_separate() {
    let (backend, seen) = start_backend().await;
    let proxy = start_proxy(&backend).await;

    reqwest::get(format!("{}/api/research/jobs/x%3Fa=1?page=2", proxy))
        .await
        .unwrap();
    assert_eq!(seen.uri.lock().unwrap()[0], "/research/jobs/x%3Fa=1?page=2");
}

#[tokio::test]
async fn raw_body_passes_through_unchanged() {
    let (backend, seen) = start_backend().await;
    let proxy = start_proxy(&backend).await;

    reqwest::Client::new()
        .post(format!("{}/api/raw", proxy))
        .header("content-type", "application/octet-stream")
        .body(PDF_BYTES.to_vec())
        .send()
        .await
        .unwrap();

    assert_eq!(seen.body.lock().unwrap()[0], PDF_BYTES);
}

#[tokio::test]
async fn every_set_cookie_is_returned() {
    let (backend, _seen) = start_backend().await;
    let proxy = start_proxy(&backend).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/api/auth/login", proxy))
        .json(&json!({ "username": "a", "password": "b" }))
        .send()
        .await
        .unwrap();

    let cookies: Vec<_> = resp
        .headers()
        .get_all("set-cookie")
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert_eq!(cookies.len(), 2);
    assert!(cookies.iter().any(|c| c.starts_with("refresh_token=r1")));
    assert!(cookies.iter().any(|c| c.starts_with("csrf=c1")));
}

#[tokio::test]
async fn multipart_is_rebuilt_with_new_boundary() {
    let (backend, seen) = start_backend().await;
    let proxy = start_proxy(&backend).await;

    let form = reqwest::multipart::Form::new()
        .part(
            "files",
            reqwest::multipart::Part::bytes(b"# notes".to_vec())
                .file_name("notes.md")
                .mime_str("text/markdown")
                .unwrap(),
        )
        .part(
            "files",
            reqwest::multipart::Part::bytes(PDF_BYTES.to_vec())
                .file_name("paper.pdf")
                .mime_str("application/pdf")
                .unwrap(),
        );
    let client_boundary = form.boundary().to_string();

    let resp = reqwest::Client::new()
        .post(format!("{}/api/research/upload", proxy))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let headers = seen.headers.lock().unwrap()[0].clone();
    let ct = headers["content-type"].to_str().unwrap().to_string();
    assert!(ct.starts_with("multipart/form-data; boundary="));
    assert!(!ct.contains(&client_boundary));

    let parts = seen.parts.lock().unwrap().clone();
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0].0, "files");
    assert_eq!(parts[0].1.as_deref(), Some("notes.md"));
    assert_eq!(parts[0].2.as_deref(), Some("text/markdown"));
    assert_eq!(parts[0].3, b"# notes");
    assert_eq!(parts[1].1.as_deref(), Some("paper.pdf"));
    assert_eq!(parts[1].3, PDF_BYTES);
}

#[tokio::test]
async fn binary_response_is_intact() {
    let (backend, _seen) = start_backend().await;
    let proxy = start_proxy(&backend).await;

    let resp = reqwest::get(format!("{}/api/research/reports/r1/download", proxy))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["content-type"], "application/pdf");
    assert_eq!(resp.bytes().await.unwrap().as_ref(), PDF_BYTES);
}

#[tokio::test]
async fn non_text_response_is_not_reencoded() {
    let (backend, _seen) = start_backend().await;
    let proxy = start_proxy(&backend).await;

    let resp = reqwest::get(format!("{}/api/charts/btc.png", proxy))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["content-type"], "image/png");
    assert_eq!(resp.bytes().await.unwrap().as_ref(), PNG_BYTES);
}

#[tokio::test]
async fn backend_error_status_is_preserved() {
    let (backend, _seen) = start_backend().await;
    let proxy = start_proxy(&backend).await;

    let resp = reqwest::get(format!("{}/api/research/reports/missing", proxy))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["detail"], "Report not found");
}

#[tokio::test]
async fn unreachable_backend_returns_503_for_every_method() {
    let proxy = start_proxy(&dead_backend().await).await;
    let client = reqwest::Client::new();
    let url = format!("{}/api/research/jobs/j1", proxy);

    for req in [
        client.get(&url),
        client.post(&url).json(&json!({})),
        client.delete(&url),
    ] {
        let resp = req.send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body, json!({ "detail": CONNECT_FAILURE_DETAIL }));
    }
}

#[tokio::test]
async fn health_reports_version() {
    let proxy = start_proxy(&dead_backend().await).await;
    let body: Value = reqwest::get(format!("{}/health", proxy))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}
