//! Typed `/automation/*` endpoints.
//!
//! The Notion database is the source of truth for queue and history; these
//! views are read-only mirrors, and the only writes are "trigger this item",
//! "force a sync", and the workflow config.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::client::ApiClient;
use crate::error::{ClientError, Result};
use crate::research::validate_id;
use crate::session::Session;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotionStatus {
    pub connected: bool,
    #[serde(default)]
    pub workspace_name: Option<String>,
    #[serde(default)]
    pub database_id: Option<String>,
    #[serde(default)]
    pub last_sync: Option<DateTime<Utc>>,
    #[serde(default = "default_sync_interval")]
    pub sync_interval_minutes: u32,
    #[serde(default)]
    pub error: Option<String>,
}

fn default_sync_interval() -> u32 {
    5
}

/// A pending research request mirrored from Notion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub item_id: String,
    pub title: String,
    pub status: String,
    #[serde(default)]
    pub priority: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub source_type: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Queue {
    pub items: Vec<QueueItem>,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerResponse {
    pub job_id: String,
    pub item_id: String,
    #[serde(default)]
    pub message: String,
}

/// A completed, scored research item mirrored from Notion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryItem {
    pub item_id: String,
    pub title: String,
    pub completed_at: DateTime<Utc>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub score_breakdown: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    pub report_id: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct History {
    pub items: Vec<HistoryItem>,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default = "default_true")]
    pub auto_process: bool,
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default = "default_true")]
    pub auto_score: bool,
    #[serde(default)]
    pub notify_on_complete: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            auto_process: true,
            default_model: default_model(),
            auto_score: true,
            notify_on_complete: false,
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_model() -> String {
    "anthropic/claude-sonnet-4.5".to_string()
}

/// `/automation/*` endpoints bound to one session.
#[derive(Clone, Copy)]
pub struct AutomationApi<'a> {
    client: &'a ApiClient,
    session: &'a Session,
}

impl<'a> AutomationApi<'a> {
    pub fn new(client: &'a ApiClient, session: &'a Session) -> Self {
        Self { client, session }
    }

    pub async fn status(&self) -> Result<NotionStatus> {
        self.client
            .get_json(self.session, "/automation/status", &[])
            .await
    }

    pub async fn queue(&self) -> Result<Queue> {
        self.client
            .get_json(self.session, "/automation/queue", &[])
            .await
    }

    /// Starts research for a queued item; poll the returned job id.
    pub async fn trigger(&self, item_id: &str) -> Result<TriggerResponse> {
        validate_id("item", item_id)?;
        self.client
            .post_json(
                self.session,
                &format!("/automation/trigger/{}", item_id),
                &json!({}),
            )
            .await
    }

    pub async fn history(&self, limit: u32) -> Result<History> {
        if limit == 0 {
            return Err(ClientError::Invalid("limit must be >= 1".into()));
        }
        self.client
            .get_json(
                self.session,
                "/automation/history",
                &[("limit", limit.to_string())],
            )
            .await
    }

    pub async fn config(&self) -> Result<WorkflowConfig> {
        self.client
            .get_json(self.session, "/automation/config", &[])
            .await
    }

    pub async fn update_config(&self, config: &WorkflowConfig) -> Result<WorkflowConfig> {
        self.client
            .put_json(self.session, "/automation/config", config)
            .await
    }

    /// Forces an immediate Notion sync. The response shape is backend-defined.
    pub async fn sync(&self) -> Result<Value> {
        self.client
            .post_json(self.session, "/automation/sync", &json!({}))
            .await
    }
}
