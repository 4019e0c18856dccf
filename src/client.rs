//! HTTP client wrapper for the research backend.
//!
//! [`ApiClient`] builds outbound requests, attaches credentials according to
//! the endpoint's class, and normalizes every non-2xx response into a
//! [`ClientError::Http`].
//!
//! # Endpoint classes
//!
//! | Class | Paths | Credentials |
//! |-------|-------|-------------|
//! | [`EndpointClass::Cookie`] | `/auth/login`, `/auth/refresh`, `/auth/logout` | refresh cookie from the jar |
//! | [`EndpointClass::Bearer`] | everything else | `Authorization: Bearer <token>` from the [`Session`] |
//!
//! The cookie jar is always active, so cookie-class requests behave like a
//! browser `fetch` with `credentials: include`.
//!
//! # Token capture
//!
//! A successful `/auth/login` or `/auth/refresh` stores the returned access
//! token in the session passed to the call. Callers never handle the token
//! themselves.

use bytes::Bytes;
use futures_util::{Stream, StreamExt, TryStreamExt};
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::{multipart::Form, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::config::ApiConfig;
use crate::error::{ClientError, ErrorPayload, Result};
use crate::models::TokenResponse;
use crate::session::Session;

/// Header carrying the per-request correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

const COOKIE_PATHS: &[&str] = &["auth/login", "auth/refresh", "auth/logout"];
const TOKEN_PATHS: &[&str] = &["auth/login", "auth/refresh"];

/// How a request to a given path is authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointClass {
    Cookie,
    Bearer,
}

/// Classifies a path such as `/auth/login` or `research/jobs/abc?x=1`.
pub fn classify(path: &str) -> EndpointClass {
    let p = normalize_path(path);
    if COOKIE_PATHS.contains(&p) {
        EndpointClass::Cookie
    } else {
        EndpointClass::Bearer
    }
}

fn normalize_path(path: &str) -> &str {
    let p = path.split(['?', '#']).next().unwrap_or("");
    p.trim_matches('/')
}

fn returns_token(path: &str) -> bool {
    TOKEN_PATHS.contains(&normalize_path(path))
}

/// A successful response body.
#[derive(Debug)]
pub enum Payload {
    /// Parsed JSON. Empty bodies decode to `Value::Null`.
    Json(Value),
    /// Anything that is not JSON (file downloads), left unread.
    Stream(ByteStream),
}

impl Payload {
    /// Deserializes a JSON payload into `T`.
    pub fn json<T: DeserializeOwned>(self) -> Result<T> {
        match self {
            Payload::Json(v) => Ok(serde_json::from_value(v)?),
            Payload::Stream(s) => Err(ClientError::Decode(format!(
                "expected a JSON body, got {}",
                s.content_type().unwrap_or("no content type")
            ))),
        }
    }

    pub fn into_stream(self) -> Result<ByteStream> {
        match self {
            Payload::Stream(s) => Ok(s),
            Payload::Json(_) => Err(ClientError::Decode(
                "expected a file body, got JSON".to_string(),
            )),
        }
    }
}

/// Opaque handle to an unread, non-JSON response body.
#[derive(Debug)]
pub struct ByteStream {
    content_type: Option<String>,
    filename: Option<String>,
    response: Response,
}

impl ByteStream {
    fn new(response: Response) -> Self {
        let content_type = header_str(&response, CONTENT_TYPE);
        let filename = header_str(&response, CONTENT_DISPOSITION)
            .as_deref()
            .and_then(filename_from_disposition);
        Self {
            content_type,
            filename,
            response,
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// File name from `Content-Disposition`, if the backend sent one.
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    pub fn content_length(&self) -> Option<u64> {
        self.response.content_length()
    }

    /// Reads the whole body into memory.
    pub async fn bytes(self) -> Result<Bytes> {
        Ok(self.response.bytes().await?)
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes>> {
        self.response.bytes_stream().map_err(ClientError::from)
    }

    /// Copies the body into `out` chunk by chunk, returning the byte count.
    pub async fn write_to<W>(self, out: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin,
    {
        copy_stream(self.into_stream(), out).await
    }

    /// Streams the body into a new file at `path`. A partially written file
    /// is removed when the transfer fails.
    pub async fn save_to(self, path: &Path) -> Result<u64> {
        save_stream(self.into_stream(), path).await
    }
}

async fn copy_stream<S, W>(stream: S, out: &mut W) -> Result<u64>
where
    S: Stream<Item = Result<Bytes>>,
    W: AsyncWrite + Unpin,
{
    let mut written = 0u64;
    let mut stream = Box::pin(stream);
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        out.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    out.flush().await?;
    Ok(written)
}

async fn save_stream<S>(stream: S, path: &Path) -> Result<u64>
where
    S: Stream<Item = Result<Bytes>>,
{
    let mut file = tokio::fs::File::create(path).await?;
    match copy_stream(stream, &mut file).await {
        Ok(written) => Ok(written),
        Err(e) => {
            drop(file);
            if let Err(rm) = tokio::fs::remove_file(path).await {
                warn!(path = %path.display(), error = %rm, "could not remove partial download");
            }
            Err(e)
        }
    }
}

fn header_str(response: &Response, name: reqwest::header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// Bare file name from a `Content-Disposition` header.
///
/// Directory components are stripped, so the result is always safe to join
/// onto a local directory. `.`, `..` and empty names yield `None`.
fn filename_from_disposition(value: &str) -> Option<String> {
    let raw = value.split(';').map(str::trim).find_map(|part| {
        part.strip_prefix("filename=")
            .map(|f| f.trim_matches('"').replace('\\', "/"))
    })?;
    let name = Path::new(&raw).file_name()?.to_str()?;
    match name.trim() {
        "" | "." | ".." => None,
        _ => Some(name.to_string()),
    }
}

fn is_json(content_type: Option<&str>) -> bool {
    content_type
        .map(|ct| {
            let ct = ct.to_ascii_lowercase();
            ct.starts_with("application/json") || ct.contains("+json")
        })
        .unwrap_or(false)
}

/// Client for the research backend API.
///
/// Cheap to clone; clones share the connection pool and cookie jar.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let user_agent = config
            .user_agent
            .clone()
            .unwrap_or_else(|| format!("aos/{}", env!("CARGO_PKG_VERSION")));
        Self::build(&config.base_url, config.timeout(), &user_agent)
    }

    /// Client with default settings against `base_url`.
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        Self::build(
            base_url,
            None,
            &format!("aos/{}", env!("CARGO_PKG_VERSION")),
        )
    }

    fn build(base_url: &str, timeout: Option<Duration>, user_agent: &str) -> Result<Self> {
        reqwest::Url::parse(base_url)
            .map_err(|e| ClientError::Config(format!("invalid base URL {}: {}", base_url, e)))?;

        let mut builder = reqwest::Client::builder()
            .cookie_store(true)
            .user_agent(user_agent);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for an API path.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn get(
        &self,
        session: &Session,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Payload> {
        let req = self.http.get(self.url(path)).query(params);
        self.send(session, Method::GET, path, req).await
    }

    pub async fn post<B: Serialize + ?Sized>(
        &self,
        session: &Session,
        path: &str,
        body: &B,
    ) -> Result<Payload> {
        let req = self.http.post(self.url(path)).json(body);
        self.send(session, Method::POST, path, req).await
    }

    /// Multipart POST. The boundary and `Content-Type` come from the form.
    pub async fn post_form(&self, session: &Session, path: &str, form: Form) -> Result<Payload> {
        let req = self.http.post(self.url(path)).multipart(form);
        self.send(session, Method::POST, path, req).await
    }

    pub async fn put<B: Serialize + ?Sized>(
        &self,
        session: &Session,
        path: &str,
        body: &B,
    ) -> Result<Payload> {
        let req = self.http.put(self.url(path)).json(body);
        self.send(session, Method::PUT, path, req).await
    }

    pub async fn delete(&self, session: &Session, path: &str) -> Result<Payload> {
        let req = self.http.delete(self.url(path));
        self.send(session, Method::DELETE, path, req).await
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        session: &Session,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        self.get(session, path, params).await?.json()
    }

    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        session: &Session,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.post(session, path, body).await?.json()
    }

    pub async fn put_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        session: &Session,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.put(session, path, body).await?.json()
    }

    async fn send(
        &self,
        session: &Session,
        method: Method,
        path: &str,
        mut req: RequestBuilder,
    ) -> Result<Payload> {
        let request_id = uuid::Uuid::new_v4().to_string();
        req = req.header(REQUEST_ID_HEADER, &request_id);

        if classify(path) == EndpointClass::Bearer {
            if let Some(auth) = session.authorization() {
                let mut value = HeaderValue::from_str(&auth)
                    .map_err(|_| ClientError::Invalid("access token is not a valid header".into()))?;
                value.set_sensitive(true);
                req = req.header(AUTHORIZATION, value);
            }
        }

        let response = req.send().await.map_err(|e| {
            warn!(%method, path, request_id = %request_id, error = %e, "request failed");
            ClientError::Network(e)
        })?;

        let status = response.status();
        debug!(%method, path, request_id = %request_id, status = status.as_u16(), "response");

        if !status.is_success() {
            return Err(error_from_response(response).await);
        }

        let content_type = header_str(&response, CONTENT_TYPE);
        let payload = if is_json(content_type.as_deref()) {
            let text = response.text().await?;
            if text.trim().is_empty() {
                Payload::Json(Value::Null)
            } else {
                Payload::Json(serde_json::from_str(&text)?)
            }
        } else if status == StatusCode::NO_CONTENT || response.content_length() == Some(0) {
            Payload::Json(Value::Null)
        } else {
            Payload::Stream(ByteStream::new(response))
        };

        if returns_token(path) {
            let Payload::Json(v) = &payload else {
                return Err(ClientError::Decode(format!(
                    "{} returned a non-JSON body instead of a token",
                    path
                )));
            };
            let token: TokenResponse = serde_json::from_value(v.clone())?;
            session.set_token(token.access_token, Duration::from_secs(token.expires_in));
            debug!(path, "access token stored");
        }

        Ok(payload)
    }
}

/// Turns a non-2xx response into a [`ClientError::Http`].
///
/// `detail` that is not a string (e.g. validation error arrays) is kept as
/// its JSON text.
async fn error_from_response(response: Response) -> ClientError {
    let status = response.status();
    let status_text = status.canonical_reason().unwrap_or("").to_string();
    let payload = match response.text().await {
        Ok(text) => parse_error_payload(&text),
        Err(_) => None,
    };
    ClientError::Http {
        status,
        status_text,
        payload,
    }
}

fn parse_error_payload(text: &str) -> Option<ErrorPayload> {
    let value: Value = serde_json::from_str(text).ok()?;
    let detail = match value.get("detail")? {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let error_code = value
        .get("error_code")
        .and_then(Value::as_str)
        .map(str::to_string);
    Some(ErrorPayload { detail, error_code })
}
