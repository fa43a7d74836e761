use crate::cli::client::DaemonClient;
use crate::core::models::{JobContext, JobType, PollingJob};
use anyhow::{Context, Result};
use serde_json::Value;

pub async fn run(job_type: JobType, id: String, context: Vec<String>, json: bool) -> Result<()> {
    let context = build_context(job_type, &id, &context)?;
    let method = match job_type {
        JobType::Report => "StartReportPolling",
        JobType::Task => "StartTaskPolling",
    };

    let client = DaemonClient::connect().await?;
    let reply = client
        .call_string(method, &serde_json::to_string(&context)?)
        .await?;
    let job: PollingJob = serde_json::from_str(&reply).context("Daemon returned an invalid job")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&job)?);
    } else {
        println!(
            "Polling {} {} (started {})",
            job.job_type,
            job.job_id,
            job.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }

    Ok(())
}

/// Builds the job context from `key=value` pairs. Values that parse as JSON keep their type.
fn build_context(job_type: JobType, id: &str, pairs: &[String]) -> Result<JobContext> {
    let mut context = JobContext::new();

    for pair in pairs {
        let (key, raw) = pair
            .split_once('=')
            .with_context(|| format!("Invalid context entry {pair:?}, expected key=value"))?;
        let key = key.trim();
        if key.is_empty() {
            anyhow::bail!("Invalid context entry {pair:?}, key is empty");
        }
        let value = serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        context.insert(key.to_string(), value);
    }

    context.insert(job_type.id_field().to_string(), Value::String(id.to_string()));
    Ok(context)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_context_types_values() {
        let pairs = vec![
            "propertyId=42".to_string(),
            "startDate=2026-03-01".to_string(),
            "compact=true".to_string(),
            "label=\"Q1\"".to_string(),
        ];
        let context = build_context(JobType::Report, "R1", &pairs).unwrap();

        assert_eq!(context["reportId"], "R1");
        assert_eq!(context["propertyId"], 42);
        assert_eq!(context["startDate"], "2026-03-01");
        assert_eq!(context["compact"], true);
        assert_eq!(context["label"], "Q1");
    }

    #[test]
    fn test_build_context_id_flag_wins() {
        let pairs = vec!["taskId=other".to_string()];
        let context = build_context(JobType::Task, "T1", &pairs).unwrap();
        assert_eq!(context["taskId"], "T1");
    }

    #[test]
    fn test_build_context_rejects_malformed_pairs() {
        assert!(build_context(JobType::Report, "R1", &["novalue".to_string()]).is_err());
        assert!(build_context(JobType::Report, "R1", &["=x".to_string()]).is_err());
    }
}
