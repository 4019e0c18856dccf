//! Job polling loop.
//!
//! [`poll_job`] fetches a job repeatedly until it reaches a terminal status.
//! Polls are strictly sequential: the next fetch is scheduled only after the
//! previous one resolved and the interval elapsed, so there is never more
//! than one request in flight for a job.
//!
//! | Status seen | Effect |
//! |-------------|--------|
//! | `completed` | resolve with the job, no further fetches |
//! | `failed` | reject with [`ClientError::JobFailed`] carrying `error` or [`FALLBACK_FAILURE`] |
//! | anything else | call `on_progress` once, sleep `interval`, poll again |
//!
//! Network and HTTP errors during a fetch are returned immediately; retrying
//! is left to the caller.
//!
//! There is no cancel token. Dropping the returned future stops polling at
//! the next await point; a caller that only wants to stop reacting must
//! ignore further `on_progress` calls itself.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::config::PollingConfig;
use crate::error::{ClientError, Result};
use crate::models::{Job, JobStatus};

/// Message used when a failed job carries no `error`.
pub const FALLBACK_FAILURE: &str = "Job failed";

/// Anything that can fetch a job snapshot by id.
#[async_trait]
pub trait JobSource: Send + Sync {
    async fn fetch_job(&self, job_id: &str) -> Result<Job>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    pub interval: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(2000),
        }
    }
}

impl From<&PollingConfig> for PollOptions {
    fn from(cfg: &PollingConfig) -> Self {
        Self {
            interval: Duration::from_millis(cfg.interval_ms),
        }
    }
}

/// Polls without a progress callback.
pub async fn poll_job<S>(source: &S, job_id: &str, opts: PollOptions) -> Result<Job>
where
    S: JobSource + ?Sized,
{
    poll_job_with_progress(source, job_id, |_| {}, opts).await
}

/// Polls until terminal, calling `on_progress` with every non-terminal snapshot.
pub async fn poll_job_with_progress<S, F>(
    source: &S,
    job_id: &str,
    mut on_progress: F,
    opts: PollOptions,
) -> Result<Job>
where
    S: JobSource + ?Sized,
    F: FnMut(&Job),
{
    loop {
        let job = source.fetch_job(job_id).await?;
        debug!(job_id, status = %job.status, progress = job.progress, "polled job");

        match job.status {
            JobStatus::Completed => return Ok(job),
            JobStatus::Failed => {
                let message = job
                    .error
                    .filter(|e| !e.trim().is_empty())
                    .unwrap_or_else(|| FALLBACK_FAILURE.to_string());
                return Err(ClientError::JobFailed(message));
            }
            JobStatus::Pending | JobStatus::InProgress | JobStatus::Retrying => {
                on_progress(&job);
                tokio::time::sleep(opts.interval).await;
            }
        }
    }
}
