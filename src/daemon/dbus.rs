use crate::core::models::{JobContext, JobType};
use crate::core::notifications::{Snackbar, SnackbarState};
use crate::daemon::polling::PollingService;
use crate::daemon::{DBUS_NAME, DBUS_PATH};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use zbus::{fdo, interface, Connection, SignalContext};

pub struct PollerInterface {
    service: Arc<PollingService>,
    snackbar: Snackbar,
}

impl PollerInterface {
    pub fn new(service: Arc<PollingService>, snackbar: Snackbar) -> Self {
        Self { service, snackbar }
    }
}

fn parse_job_type(job_type: &str) -> fdo::Result<JobType> {
    job_type
        .parse()
        .map_err(|e: anyhow::Error| fdo::Error::InvalidArgs(e.to_string()))
}

fn parse_context(context_json: &str) -> fdo::Result<JobContext> {
    serde_json::from_str(context_json)
        .map_err(|e| fdo::Error::InvalidArgs(format!("context must be a JSON object: {e}")))
}

fn to_json<T: serde::Serialize>(value: &T) -> fdo::Result<String> {
    serde_json::to_string(value).map_err(|e| fdo::Error::Failed(e.to_string()))
}

#[interface(name = "com.github.navigator.Poller")]
impl PollerInterface {
    async fn start_report_polling(&self, context_json: &str) -> fdo::Result<String> {
        tracing::info!("D-Bus StartReportPolling called");
        let job = self
            .service
            .start_report_polling(parse_context(context_json)?)
            .await
            .map_err(|e| fdo::Error::InvalidArgs(e.to_string()))?;
        to_json(&job)
    }

    async fn start_task_polling(&self, context_json: &str) -> fdo::Result<String> {
        tracing::info!("D-Bus StartTaskPolling called");
        let job = self
            .service
            .start_task_polling(parse_context(context_json)?)
            .await
            .map_err(|e| fdo::Error::InvalidArgs(e.to_string()))?;
        to_json(&job)
    }

    async fn stop_polling(&self, job_type: &str) -> fdo::Result<bool> {
        let job_type = parse_job_type(job_type)?;
        tracing::info!(%job_type, "D-Bus StopPolling called");
        Ok(self.service.stop_polling(job_type).await)
    }

    async fn stop_all_polling(&self) {
        tracing::info!("D-Bus StopAllPolling called");
        self.service.stop_all_polling().await;
    }

    /// JSON of the job for `job_type`, or `null` when none was started.
    async fn get_polling_state(&self, job_type: &str) -> fdo::Result<String> {
        let job_type = parse_job_type(job_type)?;
        to_json(&self.service.get_polling_state(job_type).await)
    }

    async fn is_polling(&self, job_type: &str) -> fdo::Result<bool> {
        let job_type = parse_job_type(job_type)?;
        Ok(self.service.is_polling(job_type).await)
    }

    async fn hide_notification(&self) {
        self.snackbar.hide();
    }

    /// JSON of the visible (or last hidden) notification.
    async fn current_notification(&self) -> fdo::Result<String> {
        to_json(&self.snackbar.current())
    }

    #[zbus(signal)]
    async fn notification(ctx: &SignalContext<'_>, kind: &str, message: &str) -> zbus::Result<()>;
}

pub async fn start_dbus_server(
    service: Arc<PollingService>,
    snackbar: Snackbar,
) -> Result<Connection> {
    let connection = zbus::connection::Builder::session()?
        .name(DBUS_NAME)?
        .serve_at(DBUS_PATH, PollerInterface::new(service, snackbar))?
        .build()
        .await
        .context("Failed to register D-Bus service - is another daemon running?")?;

    tracing::info!(name = DBUS_NAME, path = DBUS_PATH, "D-Bus service registered");
    Ok(connection)
}

/// Re-emits visible snackbar states as `Notification` signals.
pub async fn forward_notifications(
    connection: Connection,
    mut rx: mpsc::UnboundedReceiver<SnackbarState>,
) {
    let iface = match connection
        .object_server()
        .interface::<_, PollerInterface>(DBUS_PATH)
        .await
    {
        Ok(iface) => iface,
        Err(e) => {
            tracing::warn!(error = %e, "D-Bus interface missing, notification signals disabled");
            return;
        }
    };

    while let Some(state) = rx.recv().await {
        if !state.open {
            continue;
        }
        if let Err(e) =
            PollerInterface::notification(iface.signal_context(), state.kind.name(), &state.message)
                .await
        {
            tracing::warn!(error = %e, "Failed to emit Notification signal");
        }
    }
}
