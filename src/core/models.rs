use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Job-specific fields supplied by the caller (report id, date range, property id, ...).
pub type JobContext = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    Report,
    Task,
}

impl JobType {
    pub const ALL: [JobType; 2] = [JobType::Report, JobType::Task];

    pub fn name(&self) -> &'static str {
        match self {
            JobType::Report => "report",
            JobType::Task => "task",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            JobType::Report => "Report",
            JobType::Task => "Task",
        }
    }

    pub fn storage_key(&self) -> &'static str {
        match self {
            JobType::Report => "navigator.polling.report",
            JobType::Task => "navigator.polling.task",
        }
    }

    /// Context field carrying the job id.
    pub fn id_field(&self) -> &'static str {
        match self {
            JobType::Report => "reportId",
            JobType::Task => "taskId",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for JobType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "report" => Ok(JobType::Report),
            "task" => Ok(JobType::Task),
            other => anyhow::bail!("Unknown job type: {}. Valid types: report, task", other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Active,
    Succeeded,
    Failed,
    Stopped,
}

impl JobStatus {
    /// Whether a persisted job in this state should be picked up again on startup.
    pub fn is_resumable(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Active)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStatus::Pending => "pending",
            JobStatus::Active => "active",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
            JobStatus::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollingJob {
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub job_id: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub last_polled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub retry_count: u32,
    pub status: JobStatus,
    #[serde(default)]
    pub context: JobContext,
}

impl PollingJob {
    pub fn new(
        job_type: JobType,
        job_id: String,
        context: JobContext,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            job_type,
            job_id,
            started_at,
            last_polled_at: None,
            retry_count: 0,
            status: JobStatus::Pending,
            context,
        }
    }

    /// Extracts the job id from the type's id field. Numbers are accepted and stringified.
    pub fn id_from_context(job_type: JobType, context: &JobContext) -> Option<String> {
        let id = match context.get(job_type.id_field())? {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };

        (!id.is_empty()).then_some(id)
    }
}

/// Body returned by the status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPayload {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, alias = "downloadUrl")]
    pub result_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn context(value: Value) -> JobContext {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_job_type_keys() {
        assert_eq!(JobType::Report.storage_key(), "navigator.polling.report");
        assert_eq!(JobType::Task.storage_key(), "navigator.polling.task");
        assert_eq!(JobType::Report.id_field(), "reportId");
        assert_eq!(JobType::Task.id_field(), "taskId");
    }

    #[test]
    fn test_job_type_parse() {
        assert_eq!("report".parse::<JobType>().unwrap(), JobType::Report);
        assert_eq!(" TASK ".parse::<JobType>().unwrap(), JobType::Task);
        assert!("rates".parse::<JobType>().is_err());
    }

    #[test]
    fn test_status_classes() {
        assert!(JobStatus::Pending.is_resumable());
        assert!(JobStatus::Active.is_resumable());
        assert!(!JobStatus::Stopped.is_resumable());
        assert!(!JobStatus::Failed.is_resumable());
    }

    #[test]
    fn test_id_from_context() {
        let ctx = context(json!({"reportId": "R1", "propertyId": 42}));
        assert_eq!(
            PollingJob::id_from_context(JobType::Report, &ctx),
            Some("R1".to_string())
        );
        assert_eq!(PollingJob::id_from_context(JobType::Task, &ctx), None);

        let numeric = context(json!({"taskId": 1234}));
        assert_eq!(
            PollingJob::id_from_context(JobType::Task, &numeric),
            Some("1234".to_string())
        );

        let blank = context(json!({"reportId": "  "}));
        assert_eq!(PollingJob::id_from_context(JobType::Report, &blank), None);

        let wrong_shape = context(json!({"reportId": ["R1"]}));
        assert_eq!(PollingJob::id_from_context(JobType::Report, &wrong_shape), None);
    }

    #[test]
    fn test_polling_job_storage_shape() {
        let started = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let mut job = PollingJob::new(
            JobType::Report,
            "R1".to_string(),
            context(json!({"reportId": "R1", "startDate": "2026-03-01"})),
            started,
        );
        job.retry_count = 2;

        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["type"], "report");
        assert_eq!(value["jobId"], "R1");
        assert_eq!(value["retryCount"], 2);
        assert_eq!(value["status"], "pending");
        assert_eq!(value["context"]["startDate"], "2026-03-01");
        assert!(value["lastPolledAt"].is_null());
    }

    #[test]
    fn test_status_payload_accepts_download_url_alias() {
        let payload: StatusPayload =
            serde_json::from_str(r#"{"status":"completed","downloadUrl":"https://x/r.pdf"}"#)
                .unwrap();
        assert_eq!(payload.result_url.as_deref(), Some("https://x/r.pdf"));
        assert!(payload.message.is_none());
    }
}
