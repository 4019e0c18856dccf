//! Typed `/research/*` endpoints.
//!
//! Request bodies are checked locally against the same limits the backend
//! enforces, so obviously bad requests fail with [`ClientError::Invalid`]
//! before any I/O.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use std::path::Path;

use crate::client::{ApiClient, ByteStream};
use crate::error::{ClientError, Result};
use crate::jobs::JobSource;
use crate::models::{
    EntityExtractionRequest, EntityExtractionResponse, GenerateRequest, GenerateResponse, Job,
    Report, ReportList, ScrapeRequest, ScrapeResponse, UploadResponse,
};
use crate::session::Session;

pub const MAX_UPLOAD_FILES: usize = 10;
pub const MAX_SCRAPE_URLS: usize = 10;
pub const MAX_PAGE_SIZE: u32 = 100;
pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "docx", "txt", "md"];

/// A document to upload.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub filename: String,
    pub content: Vec<u8>,
}

impl UploadFile {
    pub fn new(filename: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
        }
    }

    pub async fn from_path(path: &Path) -> Result<Self> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ClientError::Invalid(format!("no file name in {}", path.display())))?
            .to_string();
        let content = tokio::fs::read(path)
            .await
            .map_err(|e| ClientError::Invalid(format!("cannot read {}: {}", path.display(), e)))?;
        Ok(Self { filename, content })
    }

    fn extension(&self) -> Option<String> {
        Path::new(&self.filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }

    fn mime(&self) -> &'static str {
        match self.extension().as_deref() {
            Some("pdf") => "application/pdf",
            Some("docx") => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            Some("md") => "text/markdown",
            _ => "text/plain",
        }
    }
}

pub fn validate_upload(files: &[UploadFile]) -> Result<()> {
    if files.is_empty() {
        return Err(ClientError::Invalid("at least one file is required".into()));
    }
    if files.len() > MAX_UPLOAD_FILES {
        return Err(ClientError::Invalid(format!(
            "Maximum {} files per upload",
            MAX_UPLOAD_FILES
        )));
    }
    for f in files {
        if f.filename.trim().is_empty() {
            return Err(ClientError::Invalid("File must have a filename".into()));
        }
        match f.extension() {
            Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => {}
            _ => {
                return Err(ClientError::Invalid(format!(
                    "Invalid file extension for {}. Allowed: {}",
                    f.filename,
                    ALLOWED_EXTENSIONS.join(", ")
                )))
            }
        }
    }
    Ok(())
}

pub fn validate_scrape(req: &ScrapeRequest) -> Result<()> {
    match (&req.urls, &req.sitemap_url) {
        (Some(_), Some(_)) => Err(ClientError::Invalid(
            "Provide either urls or sitemap_url, not both".into(),
        )),
        (None, None) => Err(ClientError::Invalid("Provide urls or sitemap_url".into())),
        (Some(urls), None) => {
            if urls.is_empty() {
                return Err(ClientError::Invalid("urls must not be empty".into()));
            }
            if urls.len() > MAX_SCRAPE_URLS {
                return Err(ClientError::Invalid(format!(
                    "Maximum {} URLs per scrape",
                    MAX_SCRAPE_URLS
                )));
            }
            urls.iter().try_for_each(|u| validate_web_url(u))
        }
        (None, Some(sitemap)) => validate_web_url(sitemap),
    }
}

fn validate_web_url(value: &str) -> Result<()> {
    match reqwest::Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host().is_some() => Ok(()),
        _ => Err(ClientError::Invalid(format!("Invalid URL: {}", value))),
    }
}

fn require_sources(sources: &[String]) -> Result<()> {
    if sources.iter().all(|s| s.trim().is_empty()) {
        return Err(ClientError::Invalid("At least one source is required".into()));
    }
    Ok(())
}

/// Ids are interpolated into paths, so they must be a single segment.
pub(crate) fn validate_id(kind: &str, id: &str) -> Result<()> {
    if id.is_empty() || id.contains(['/', '?', '#']) {
        return Err(ClientError::Invalid(format!("invalid {} id: {:?}", kind, id)));
    }
    Ok(())
}

/// `/research/*` endpoints bound to one session.
#[derive(Clone, Copy)]
pub struct ResearchApi<'a> {
    client: &'a ApiClient,
    session: &'a Session,
}

impl<'a> ResearchApi<'a> {
    pub fn new(client: &'a ApiClient, session: &'a Session) -> Self {
        Self { client, session }
    }

    /// Uploads documents; the returned job processes them.
    pub async fn upload(&self, files: Vec<UploadFile>) -> Result<UploadResponse> {
        validate_upload(&files)?;
        let mut form = Form::new();
        for f in files {
            let mime = f.mime();
            let part = Part::bytes(f.content)
                .file_name(f.filename)
                .mime_str(mime)
                .map_err(|e| ClientError::Invalid(e.to_string()))?;
            form = form.part("files", part);
        }
        self.client
            .post_form(self.session, "/research/upload", form)
            .await?
            .json()
    }

    pub async fn scrape(&self, req: &ScrapeRequest) -> Result<ScrapeResponse> {
        validate_scrape(req)?;
        self.client
            .post_json(self.session, "/research/scrape", req)
            .await
    }

    pub async fn generate(&self, req: &GenerateRequest) -> Result<GenerateResponse> {
        if req.model.trim().is_empty() {
            return Err(ClientError::Invalid("model is required".into()));
        }
        require_sources(&req.sources)?;
        self.client
            .post_json(self.session, "/research/generate", req)
            .await
    }

    pub async fn extract_entities(
        &self,
        req: &EntityExtractionRequest,
    ) -> Result<EntityExtractionResponse> {
        require_sources(&req.sources)?;
        self.client
            .post_json(self.session, "/research/extract-entities", req)
            .await
    }

    pub async fn job(&self, job_id: &str) -> Result<Job> {
        validate_id("job", job_id)?;
        self.client
            .get_json(self.session, &format!("/research/jobs/{}", job_id), &[])
            .await
    }

    pub async fn reports(&self, page: u32, page_size: u32) -> Result<ReportList> {
        if page == 0 {
            return Err(ClientError::Invalid("page must be >= 1".into()));
        }
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(ClientError::Invalid(format!(
                "page_size must be in 1..={}",
                MAX_PAGE_SIZE
            )));
        }
        let params = [("page", page.to_string()), ("page_size", page_size.to_string())];
        self.client
            .get_json(self.session, "/research/reports", &params)
            .await
    }

    pub async fn report(&self, report_id: &str) -> Result<Report> {
        validate_id("report", report_id)?;
        self.client
            .get_json(self.session, &format!("/research/reports/{}", report_id), &[])
            .await
    }

    /// Streams the report file.
    pub async fn download_report(&self, report_id: &str) -> Result<ByteStream> {
        validate_id("report", report_id)?;
        self.client
            .get(
                self.session,
                &format!("/research/reports/{}/download", report_id),
                &[],
            )
            .await?
            .into_stream()
    }
}

#[async_trait]
impl JobSource for ResearchApi<'_> {
    async fn fetch_job(&self, job_id: &str) -> Result<Job> {
        self.job(job_id).await
    }
}
