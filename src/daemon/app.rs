use crate::checker::{CheckerRegistry, PollExecutor};
use crate::core::clock::TokioClock;
use crate::core::notifications::{forward_to_desktop, Snackbar, SnackbarState};
use crate::core::retry::RetryPolicy;
use crate::core::settings::Settings;
use crate::core::store::{FileStore, JobStore};
use crate::daemon::dbus::{forward_notifications, start_dbus_server};
use crate::daemon::polling::PollingService;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;

pub async fn run(settings: Settings) -> Result<()> {
    let state_dir = settings
        .storage
        .resolve_state_dir()
        .context("Could not determine state directory")?;
    tracing::info!(?state_dir, "Using state directory");

    let jobs = JobStore::new(Arc::new(FileStore::new(state_dir)));
    let executor = PollExecutor::new(CheckerRegistry::new(&settings)?);
    let policy = RetryPolicy::from_settings(&settings.polling);

    let snackbar = Snackbar::new();
    if settings.notifications.desktop {
        forward_to_desktop(&snackbar);
    }

    let (signal_tx, signal_rx) = mpsc::unbounded_channel::<SnackbarState>();
    snackbar.subscribe(move |state| {
        let _ = signal_tx.send(state.clone());
    });

    let service = Arc::new(PollingService::new(
        executor,
        jobs,
        policy,
        Arc::new(TokioClock),
        snackbar.clone(),
    ));

    let connection = start_dbus_server(Arc::clone(&service), snackbar).await?;
    tokio::spawn(forward_notifications(connection.clone(), signal_rx));

    let resumed = service.resume_polling().await;
    if resumed.is_empty() {
        tracing::info!("No unfinished jobs to resume");
    } else {
        tracing::info!(?resumed, "Resumed unfinished jobs");
    }

    wait_for_shutdown().await?;

    tracing::info!("Shutting down, unfinished jobs stay persisted");
    service.shutdown().await;
    drop(connection);

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    let mut terminate =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl-C")?;
            tracing::info!("Received Ctrl-C");
        }
        _ = terminate.recv() => {
            tracing::info!("Received SIGTERM");
        }
    }

    Ok(())
}
