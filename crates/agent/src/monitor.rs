use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use joey_core::api::{JobApi, JobStatus, JobStatusReport, PublishReceipt};

/// Milestone step names worth announcing even when the percentage hasn't
/// moved much. Every major phase of a generation job reports one of these.
const MILESTONE_STEPS: &[&str] = &["research", "outline", "draft", "review", "publish"];

#[derive(Clone, Copy, Debug)]
pub struct MonitorSettings {
    pub poll_interval: Duration,
    /// Minimum progress delta (percentage points) between callbacks.
    pub progress_step: u8,
    /// Consecutive transport failures tolerated before giving up.
    pub max_transport_errors: u32,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            progress_step: 20,
            max_transport_errors: 3,
        }
    }
}

/// Receives damped progress updates while a job runs.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn notify(&self, report: &JobStatusReport);
}

/// How a monitored job ended. A job-reported failure and a monitor-side
/// failure are distinct: the first carries the job's own error verbatim,
/// the second means we lost sight of the job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MonitorOutcome {
    Published { receipt: PublishReceipt },
    JobFailed { error: String },
    MonitorFailed { detail: String },
}

/// Polls one job to a terminal state. Callers spawn this detached; it
/// must never block the action that launched the job.
pub struct JobMonitor {
    jobs: Arc<dyn JobApi>,
    settings: MonitorSettings,
}

impl JobMonitor {
    pub fn new(jobs: Arc<dyn JobApi>, settings: MonitorSettings) -> Self {
        Self { jobs, settings }
    }

    pub async fn run(&self, job_id: &str, sink: &dyn ProgressSink) -> MonitorOutcome {
        let mut last_notified_progress: u8 = 0;
        let mut last_step = String::new();
        let mut transport_errors: u32 = 0;

        loop {
            let report = match self.jobs.status(job_id).await {
                Ok(report) => {
                    transport_errors = 0;
                    report
                }
                Err(error) => {
                    transport_errors += 1;
                    warn!(
                        event_name = "monitor.poll_failed",
                        job_id,
                        attempt = transport_errors,
                        %error,
                        "job status poll failed"
                    );
                    if transport_errors >= self.settings.max_transport_errors {
                        return MonitorOutcome::MonitorFailed { detail: error.user_message() };
                    }
                    tokio::time::sleep(self.settings.poll_interval).await;
                    continue;
                }
            };

            let advanced = report.progress.saturating_sub(last_notified_progress)
                >= self.settings.progress_step;
            let milestone_changed =
                report.current_step != last_step && is_milestone(&report.current_step);
            if advanced || milestone_changed {
                sink.notify(&report).await;
                last_notified_progress = report.progress;
                last_step = report.current_step.clone();
            }

            match report.status {
                JobStatus::Completed => {
                    info!(event_name = "monitor.job_completed", job_id, "job completed, publishing");
                    return match self.jobs.publish(job_id).await {
                        Ok(receipt) => MonitorOutcome::Published { receipt },
                        Err(error) => {
                            MonitorOutcome::MonitorFailed { detail: error.user_message() }
                        }
                    };
                }
                JobStatus::Failed => {
                    return MonitorOutcome::JobFailed {
                        error: report.error.unwrap_or_else(|| "Unknown".to_owned()),
                    };
                }
                JobStatus::Queued | JobStatus::Running => {
                    tokio::time::sleep(self.settings.poll_interval).await;
                }
            }
        }
    }
}

fn is_milestone(step: &str) -> bool {
    let step = step.to_ascii_lowercase();
    MILESTONE_STEPS.iter().any(|milestone| step.contains(milestone))
}

/// User-facing copy for a finished monitor.
pub fn outcome_message(topic: &str, outcome: &MonitorOutcome) -> String {
    match outcome {
        MonitorOutcome::Published { receipt } => {
            let mut message = format!("Your article on *{topic}* is ready! 🎉");
            if let Some(preview) = &receipt.preview_url {
                message.push_str(&format!("\n👀 Preview: {preview}"));
            }
            if let Some(pr) = &receipt.pr_url {
                message.push_str(&format!("\n🔀 Pull request: {pr}"));
            }
            message
        }
        MonitorOutcome::JobFailed { error } => {
            format!("The article generation for *{topic}* failed: {error}")
        }
        MonitorOutcome::MonitorFailed { detail } => format!(
            "I lost track of the *{topic}* job: {detail} The job may still finish; \
             I just can't see it anymore."
        ),
    }
}
