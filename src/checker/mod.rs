mod http;

use crate::core::error::{PollError, Result};
use crate::core::models::{JobType, PollingJob, StatusPayload};
use crate::core::settings::Settings;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

pub use http::HttpStatusChecker;

/// Performs a single status check for a job.
#[async_trait]
pub trait StatusChecker: Send + Sync {
    async fn check(&self, job: &PollingJob) -> Result<StatusPayload>;
}

#[derive(Debug)]
pub enum PollOutcome {
    Completed(StatusPayload),
    InProgress(StatusPayload),
    /// The server reported the job itself as failed.
    Rejected(StatusPayload),
    /// The check could not be completed; counts against the retry budget.
    Error(PollError),
}

impl PollOutcome {
    pub fn classify(result: Result<StatusPayload>) -> Self {
        let payload = match result {
            Ok(payload) => payload,
            Err(e) => return PollOutcome::Error(e),
        };

        match payload.status.trim().to_ascii_lowercase().as_str() {
            "completed" | "complete" | "succeeded" | "success" | "done" | "ready" => {
                PollOutcome::Completed(payload)
            }
            "pending" | "queued" | "processing" | "running" | "in_progress" | "generating" => {
                PollOutcome::InProgress(payload)
            }
            "failed" | "error" | "cancelled" | "canceled" => PollOutcome::Rejected(payload),
            other => PollOutcome::Error(PollError::Payload(format!(
                "unknown job status {other:?}"
            ))),
        }
    }
}

pub struct CheckerRegistry {
    checkers: HashMap<JobType, Arc<dyn StatusChecker>>,
}

impl CheckerRegistry {
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        let mut registry = Self::empty();
        for job_type in JobType::ALL {
            let checker = HttpStatusChecker::new(&settings.endpoint, job_type)?;
            registry.register(job_type, Arc::new(checker));
        }
        Ok(registry)
    }

    pub fn empty() -> Self {
        Self {
            checkers: HashMap::new(),
        }
    }

    /// Same checker for every job type.
    #[allow(dead_code)]
    pub fn uniform(checker: Arc<dyn StatusChecker>) -> Self {
        let mut registry = Self::empty();
        for job_type in JobType::ALL {
            registry.register(job_type, Arc::clone(&checker));
        }
        registry
    }

    pub fn register(&mut self, job_type: JobType, checker: Arc<dyn StatusChecker>) {
        self.checkers.insert(job_type, checker);
    }

    pub fn get(&self, job_type: JobType) -> Option<Arc<dyn StatusChecker>> {
        self.checkers.get(&job_type).cloned()
    }
}

/// Runs one status check and classifies the result. Never fails; errors become outcomes.
pub struct PollExecutor {
    registry: CheckerRegistry,
}

impl PollExecutor {
    pub fn new(registry: CheckerRegistry) -> Self {
        Self { registry }
    }

    pub async fn poll(&self, job: &PollingJob) -> PollOutcome {
        let Some(checker) = self.registry.get(job.job_type) else {
            return PollOutcome::Error(PollError::Request(format!(
                "no status checker registered for {}",
                job.job_type
            )));
        };

        let outcome = PollOutcome::classify(checker.check(job).await);

        match &outcome {
            PollOutcome::Error(e) => tracing::warn!(
                job_type = %job.job_type,
                job_id = %job.job_id,
                error = %e,
                "Status check failed"
            ),
            PollOutcome::InProgress(payload) => tracing::debug!(
                job_type = %job.job_type,
                job_id = %job.job_id,
                status = %payload.status,
                "Job still in progress"
            ),
            PollOutcome::Completed(_) | PollOutcome::Rejected(_) => tracing::info!(
                job_type = %job.job_type,
                job_id = %job.job_id,
                ?outcome,
                "Job reached a final status"
            ),
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::JobContext;
    use chrono::Utc;

    fn payload(status: &str) -> StatusPayload {
        StatusPayload {
            status: status.to_string(),
            message: None,
            result_url: None,
        }
    }

    struct FixedChecker(&'static str);

    #[async_trait]
    impl StatusChecker for FixedChecker {
        async fn check(&self, _job: &PollingJob) -> Result<StatusPayload> {
            Ok(payload(self.0))
        }
    }

    #[test]
    fn test_classify_statuses() {
        assert!(matches!(
            PollOutcome::classify(Ok(payload("COMPLETED"))),
            PollOutcome::Completed(_)
        ));
        assert!(matches!(
            PollOutcome::classify(Ok(payload("ready"))),
            PollOutcome::Completed(_)
        ));
        assert!(matches!(
            PollOutcome::classify(Ok(payload("processing"))),
            PollOutcome::InProgress(_)
        ));
        assert!(matches!(
            PollOutcome::classify(Ok(payload(" queued "))),
            PollOutcome::InProgress(_)
        ));
        assert!(matches!(
            PollOutcome::classify(Ok(payload("failed"))),
            PollOutcome::Rejected(_)
        ));
    }

    #[test]
    fn test_unknown_status_is_retryable_error() {
        let outcome = PollOutcome::classify(Ok(payload("exploded")));
        assert!(matches!(outcome, PollOutcome::Error(PollError::Payload(_))));
    }

    #[test]
    fn test_request_error_passes_through() {
        let outcome = PollOutcome::classify(Err(PollError::Request("timeout".into())));
        assert!(matches!(outcome, PollOutcome::Error(PollError::Request(_))));
    }

    #[tokio::test]
    async fn test_executor_uses_registered_checker() {
        let mut registry = CheckerRegistry::empty();
        registry.register(JobType::Report, Arc::new(FixedChecker("done")));
        let executor = PollExecutor::new(registry);

        let report = PollingJob::new(JobType::Report, "R1".into(), JobContext::new(), Utc::now());
        assert!(matches!(executor.poll(&report).await, PollOutcome::Completed(_)));

        let task = PollingJob::new(JobType::Task, "T1".into(), JobContext::new(), Utc::now());
        assert!(matches!(executor.poll(&task).await, PollOutcome::Error(_)));
    }
}
