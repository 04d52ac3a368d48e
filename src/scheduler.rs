//! Scheduling: cycle overlap control and cron job management.
//!
//! Cycles are externally triggered (cron hitting the trigger server,
//! or a one-shot CLI run). `CycleGate` enforces the non-overlap
//! invariant at the process level; `CronScheduler` manages the
//! recurring trigger jobs hosted by the cron publisher.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::config::OverlapPolicy;
use crate::publisher::PublisherGateway;
use crate::types::TraderError;

// ---------------------------------------------------------------------------
// Cycle gate
// ---------------------------------------------------------------------------

/// Serializes cycle execution. At most one cycle runs at a time; what
/// happens to a tick arriving mid-cycle is the configured policy.
pub struct CycleGate {
    lock: Mutex<()>,
    policy: OverlapPolicy,
}

impl CycleGate {
    pub fn new(policy: OverlapPolicy) -> Self {
        Self {
            lock: Mutex::new(()),
            policy,
        }
    }

    /// Acquire the gate for one cycle. Returns `None` when the policy
    /// is Drop and a cycle is already in flight; the caller must
    /// reject the tick. Holding the returned guard for the duration of
    /// the cycle is what enforces non-overlap.
    pub async fn acquire(&self) -> Option<MutexGuard<'_, ()>> {
        match self.policy {
            OverlapPolicy::Drop => match self.lock.try_lock() {
                Ok(guard) => Some(guard),
                Err(_) => {
                    info!("Cycle already in flight; dropping tick");
                    None
                }
            },
            OverlapPolicy::Queue => {
                debug!("Waiting for in-flight cycle");
                Some(self.lock.lock().await)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Cron jobs
// ---------------------------------------------------------------------------

/// Publisher hosting recurring HTTP trigger jobs.
const CRON_PUBLISHER: &str = "seren-cron";

const JOBS_PATH: &str = "/api/v1/jobs";

/// One recurring trigger job as reported by the cron publisher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronJob {
    pub id: String,
    pub name: String,
    pub schedule: String,
    pub url: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub paused: bool,
}

#[derive(Debug, Deserialize)]
struct JobsResponse {
    #[serde(default)]
    jobs: Vec<CronJob>,
}

/// Manages the agent's recurring trigger jobs through the cron
/// publisher. Pure delegation; the publisher owns the schedule state.
pub struct CronScheduler<'a> {
    gateway: &'a dyn PublisherGateway,
}

impl<'a> CronScheduler<'a> {
    pub fn new(gateway: &'a dyn PublisherGateway) -> Self {
        Self { gateway }
    }

    /// Register a recurring job that triggers `url` on `schedule`
    /// (standard five-field cron expression).
    pub async fn create_job(
        &self,
        name: &str,
        schedule: &str,
        url: &str,
        method: &str,
    ) -> Result<CronJob, TraderError> {
        let body = json!({
            "name": name,
            "schedule": schedule,
            "url": url,
            "method": method,
        });
        let payload = self
            .gateway
            .call(CRON_PUBLISHER, "POST", JOBS_PATH, &body)
            .await?;
        let job: CronJob =
            serde_json::from_value(payload).map_err(|e| TraderError::Connector {
                publisher: CRON_PUBLISHER.to_string(),
                message: format!("Invalid job response: {e}"),
            })?;
        info!(job_id = %job.id, schedule, "Cron job created");
        Ok(job)
    }

    pub async fn list_jobs(&self) -> Result<Vec<CronJob>, TraderError> {
        let payload = self
            .gateway
            .call(CRON_PUBLISHER, "GET", JOBS_PATH, &Value::Null)
            .await?;
        let response: JobsResponse =
            serde_json::from_value(payload).map_err(|e| TraderError::Connector {
                publisher: CRON_PUBLISHER.to_string(),
                message: format!("Invalid jobs response: {e}"),
            })?;
        Ok(response.jobs)
    }

    pub async fn pause_job(&self, job_id: &str) -> Result<(), TraderError> {
        let path = format!("{JOBS_PATH}/{}/pause", urlencoding::encode(job_id));
        self.gateway
            .call(CRON_PUBLISHER, "POST", &path, &Value::Null)
            .await?;
        info!(job_id, "Cron job paused");
        Ok(())
    }

    pub async fn resume_job(&self, job_id: &str) -> Result<(), TraderError> {
        let path = format!("{JOBS_PATH}/{}/resume", urlencoding::encode(job_id));
        self.gateway
            .call(CRON_PUBLISHER, "POST", &path, &Value::Null)
            .await?;
        info!(job_id, "Cron job resumed");
        Ok(())
    }

    pub async fn delete_job(&self, job_id: &str) -> Result<(), TraderError> {
        let path = format!("{JOBS_PATH}/{}", urlencoding::encode(job_id));
        self.gateway
            .call(CRON_PUBLISHER, "DELETE", &path, &Value::Null)
            .await?;
        info!(job_id, "Cron job deleted");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
