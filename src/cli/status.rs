use crate::cli::client::DaemonClient;
use crate::core::models::{JobStatus, JobType, PollingJob};
use crate::core::settings::Settings;
use crate::core::store::{FileStore, JobStore};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Serialize)]
struct StatusOutput {
    jobs: BTreeMap<String, JobView>,
    source: &'static str,
    #[serde(with = "chrono::serde::ts_seconds")]
    fetched_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct JobView {
    polling: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    job: Option<PollingJob>,
}

pub async fn run(json: bool, offline: bool) -> Result<()> {
    let (jobs, source) = if offline {
        (read_persisted()?, "storage")
    } else {
        (query_daemon().await?, "daemon")
    };

    if json {
        let output = StatusOutput {
            jobs: jobs
                .into_iter()
                .map(|(job_type, view)| (job_type.name().to_string(), view))
                .collect(),
            source,
            fetched_at: Utc::now(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_text_output(&jobs, Utc::now());
    }

    Ok(())
}

fn read_persisted() -> Result<Vec<(JobType, JobView)>> {
    let settings = Settings::load()?;
    let state_dir = settings
        .storage
        .resolve_state_dir()
        .context("Could not determine state directory")?;
    let store = JobStore::new(Arc::new(FileStore::new(state_dir)));

    JobType::ALL
        .into_iter()
        .map(|job_type| -> Result<(JobType, JobView)> {
            let job = store.load(job_type)?;
            // Without the daemon there is no live timer; report what storage would resume.
            let polling = job.as_ref().is_some_and(|j| j.status.is_resumable());
            Ok((job_type, JobView { polling, job }))
        })
        .collect()
}

async fn query_daemon() -> Result<Vec<(JobType, JobView)>> {
    let client = DaemonClient::connect().await?;
    let mut views = Vec::new();

    for job_type in JobType::ALL {
        let raw = client
            .call_string("GetPollingState", job_type.name())
            .await?;
        let job: Option<PollingJob> =
            serde_json::from_str(&raw).context("Daemon returned an invalid job")?;
        let polling = client.call_bool("IsPolling", job_type.name()).await?;
        views.push((job_type, JobView { polling, job }));
    }

    Ok(views)
}

fn print_text_output(jobs: &[(JobType, JobView)], now: DateTime<Utc>) {
    for (i, (job_type, view)) in jobs.iter().enumerate() {
        if i > 0 {
            println!();
        }

        println!("{}", job_type.label());

        let Some(job) = &view.job else {
            println!("  No job");
            continue;
        };

        println!("  {:<12} {}", "Job:", job.job_id);
        println!("  {:<12} {}", "Status:", status_line(job.status, view.polling));
        println!("  {:<12} {}", "Retries:", job.retry_count);
        println!("  {:<12} {} ago", "Started:", format_age(job.started_at, now));
        match job.last_polled_at {
            Some(at) => println!("  {:<12} {} ago", "Last poll:", format_age(at, now)),
            None => println!("  {:<12} never", "Last poll:"),
        }
    }
}

fn status_line(status: JobStatus, polling: bool) -> String {
    if polling {
        format!("{} (polling)", status)
    } else {
        status.to_string()
    }
}

fn format_age(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let duration = now.signed_duration_since(at);

    if duration.num_seconds() <= 0 {
        return "0s".to_string();
    }

    let total_seconds = duration.num_seconds();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}h {:02}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_format_age() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap();

        assert_eq!(format_age(now, now), "0s");
        assert_eq!(format_age(now + Duration::seconds(5), now), "0s");
        assert_eq!(format_age(now - Duration::seconds(42), now), "42s");
        assert_eq!(format_age(now - Duration::seconds(125), now), "2m 05s");
        assert_eq!(format_age(now - Duration::minutes(185), now), "3h 05m");
    }

    #[test]
    fn test_status_line() {
        assert_eq!(status_line(JobStatus::Active, true), "active (polling)");
        assert_eq!(status_line(JobStatus::Failed, false), "failed");
    }
}
