use crate::checker::StatusChecker;
use crate::core::error::{PollError, Result};
use crate::core::models::{JobType, PollingJob, StatusPayload};
use crate::core::settings::EndpointSettings;
use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;
use std::time::Duration;

/// Polls `GET {base_url}/{path}/{job_id}` and parses the JSON status payload.
pub struct HttpStatusChecker {
    client: reqwest::Client,
    base: Url,
    token: Option<String>,
}

impl HttpStatusChecker {
    pub fn new(endpoint: &EndpointSettings, job_type: JobType) -> anyhow::Result<Self> {
        let path = match job_type {
            JobType::Report => &endpoint.report_path,
            JobType::Task => &endpoint.task_path,
        };
        let base = Url::parse(&format!(
            "{}/{}",
            endpoint.base_url.trim_end_matches('/'),
            path.trim_matches('/')
        ))?;

        let mut builder =
            reqwest::Client::builder().timeout(Duration::from_secs(endpoint.timeout_secs));
        if !endpoint.system_proxy {
            builder = builder.no_proxy();
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            base,
            token: endpoint.token.clone(),
        })
    }

    fn status_url(&self, job: &PollingJob) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| PollError::Request(format!("cannot use {} as a base URL", self.base)))?
            .pop_if_empty()
            .push(&job.job_id);

        let id_field = job.job_type.id_field();
        let params: Vec<(&String, String)> = job
            .context
            .iter()
            .filter(|(key, _)| key.as_str() != id_field)
            .filter_map(|(key, value)| match value {
                Value::String(s) => Some((key, s.clone())),
                Value::Number(n) => Some((key, n.to_string())),
                Value::Bool(b) => Some((key, b.to_string())),
                _ => None,
            })
            .collect();

        if !params.is_empty() {
            let mut query = url.query_pairs_mut();
            for (key, value) in params {
                query.append_pair(key, &value);
            }
        }

        Ok(url)
    }
}

#[async_trait]
impl StatusChecker for HttpStatusChecker {
    async fn check(&self, job: &PollingJob) -> Result<StatusPayload> {
        let url = self.status_url(job)?;
        tracing::debug!(%url, job_id = %job.job_id, "Checking job status");

        let mut request = self.client.get(url).header("Accept", "application/json");
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(PollError::Status { status, body });
        }

        let body = response.text().await?;
        let payload: StatusPayload = serde_json::from_str(&body)?;
        Ok(payload)
    }
}
