//! Core data models exchanged with the research backend.
//!
//! These types mirror the JSON bodies of the `/auth/*` and `/research/*`
//! endpoints. Unknown fields are ignored on decode so newer backends stay
//! compatible.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============ Jobs ============

/// Kind of background work a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Upload,
    Scrape,
    Generate,
    ExtractEntities,
}

/// Execution status of a job.
///
/// Only [`Completed`](JobStatus::Completed) and [`Failed`](JobStatus::Failed)
/// are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    #[serde(alias = "processing")]
    InProgress,
    Completed,
    Failed,
    Retrying,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::InProgress => "in_progress",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Retrying => "retrying",
        };
        f.write_str(s)
    }
}

/// An asynchronous unit of backend work, as returned by `GET /research/jobs/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    #[serde(rename = "job_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(rename = "job_type", alias = "type")]
    pub job_type: JobType,
    pub status: JobStatus,
    /// Percentage in `0..=100`.
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub result_path: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Acknowledgement returned when a job is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobCreated {
    pub job_id: String,
    pub job_type: JobType,
    #[serde(default = "default_pending")]
    pub status: JobStatus,
    #[serde(default)]
    pub message: String,
}

fn default_pending() -> JobStatus {
    JobStatus::Pending
}

// ============ Research requests ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub job_id: String,
    pub filenames: Vec<String>,
    #[serde(default)]
    pub message: String,
}

/// Request body for `POST /research/scrape`. Exactly one of the two fields is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrapeRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urls: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sitemap_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeResponse {
    pub job_id: String,
    pub url_count: usize,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// OpenRouter model id, e.g. `anthropic/claude-sonnet-4.5`.
    pub model: String,
    /// Job ids of completed uploads or scrapes.
    pub sources: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub job_id: String,
    pub model: String,
    pub source_count: usize,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityExtractionRequest {
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityExtractionResponse {
    pub job_id: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEntity {
    pub entity_type: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub confidence: f64,
    #[serde(default)]
    pub source_refs: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityExtractionResult {
    #[serde(default)]
    pub people: Vec<ExtractedEntity>,
    #[serde(default)]
    pub organizations: Vec<ExtractedEntity>,
    #[serde(default)]
    pub technologies: Vec<ExtractedEntity>,
    #[serde(default)]
    pub locations: Vec<ExtractedEntity>,
    #[serde(default)]
    pub other: Vec<ExtractedEntity>,
}

// ============ Reports ============

/// Report row for list views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub report_id: String,
    pub title: String,
    pub model: String,
    #[serde(default)]
    pub source_count: usize,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub word_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportList {
    pub reports: Vec<ReportSummary>,
    pub total: u64,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page() -> u32 {
    1
}
fn default_page_size() -> u32 {
    20
}

/// The durable output of a completed `generate` job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    #[serde(rename = "report_id", alias = "id")]
    pub id: String,
    pub title: String,
    pub model: String,
    /// Markdown body.
    pub content: String,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub entities: Option<EntityExtractionResult>,
    pub created_at: DateTime<Utc>,
    pub word_count: u64,
}

// ============ Auth ============

#[derive(Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Body of a successful `/auth/login` or `/auth/refresh`.
#[derive(Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Seconds until the access token expires.
    pub expires_in: u64,
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

fn default_token_type() -> String {
    "bearer".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogoutResponse {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogoutAllResponse {
    #[serde(default)]
    pub message: String,
    pub tokens_revoked: u64,
}

/// The signed-in user, from `GET /auth/me`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub user_id: String,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_role() -> String {
    "user".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_accepts_processing_alias() {
        let job: Job = serde_json::from_str(
            r#"{
                "job_id": "job-1",
                "job_type": "generate",
                "status": "processing",
                "progress": 40,
                "created_at": "2026-01-01T00:00:00Z",
                "updated_at": "2026-01-01T00:00:02Z"
            }"#,
        )
        .unwrap();
        assert_eq!(job.status, JobStatus::InProgress);
        assert_eq!(job.progress, 40);
        assert_eq!(job.attempts, 0);
        assert!(!job.status.is_terminal());
    }

    #[test]
    fn job_accepts_short_field_names() {
        let job: Job = serde_json::from_str(
            r#"{
                "id": "job-2",
                "type": "extract_entities",
                "status": "failed",
                "error": "LLM timeout",
                "attempts": 3,
                "created_at": "2026-01-01T00:00:00Z",
                "updated_at": "2026-01-01T00:05:00Z"
            }"#,
        )
        .unwrap();
        assert_eq!(job.id, "job-2");
        assert_eq!(job.job_type, JobType::ExtractEntities);
        assert!(job.status.is_terminal());
        assert_eq!(job.error.as_deref(), Some("LLM timeout"));
    }

    #[test]
    fn scrape_request_omits_unset_field() {
        let req = ScrapeRequest {
            urls: None,
            sitemap_url: Some("https://example.com/sitemap.xml".into()),
        };
        let v = serde_json::to_value(&req).unwrap();
        assert!(v.get("urls").is_none());
        assert_eq!(v["sitemap_url"], "https://example.com/sitemap.xml");
    }

    #[test]
    fn token_debug_is_redacted() {
        let t: TokenResponse =
            serde_json::from_str(r#"{"access_token":"abc","expires_in":900}"#).unwrap();
        assert_eq!(t.token_type, "bearer");
        assert!(!format!("{:?}", t).contains("abc"));
    }
}
