use anyhow::Result;
use notify_rust::Notification;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnackbarKind {
    Success,
    Error,
    Warning,
    Info,
}

impl SnackbarKind {
    pub fn name(&self) -> &'static str {
        match self {
            SnackbarKind::Success => "success",
            SnackbarKind::Error => "error",
            SnackbarKind::Warning => "warning",
            SnackbarKind::Info => "info",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnackbarState {
    pub open: bool,
    pub message: String,
    pub kind: SnackbarKind,
}

impl Default for SnackbarState {
    fn default() -> Self {
        Self {
            open: false,
            message: String::new(),
            kind: SnackbarKind::Info,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&SnackbarState) + Send + Sync>;

#[derive(Default)]
struct SnackbarInner {
    state: SnackbarState,
    listeners: BTreeMap<SubscriptionId, Listener>,
}

/// Single-slot notification surface: `show` replaces whatever is visible, nothing is queued.
#[derive(Clone, Default)]
pub struct Snackbar {
    inner: Arc<Mutex<SnackbarInner>>,
    next_id: Arc<AtomicU64>,
}

impl Snackbar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&SnackbarState) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        if let Ok(mut inner) = self.inner.lock() {
            inner.listeners.insert(id, Arc::new(callback));
        }
        id
    }

    #[allow(dead_code)]
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner
            .lock()
            .map(|mut inner| inner.listeners.remove(&id).is_some())
            .unwrap_or(false)
    }

    pub fn show(&self, message: impl Into<String>, kind: SnackbarKind) {
        self.update(|state| {
            *state = SnackbarState {
                open: true,
                message: message.into(),
                kind,
            };
        });
    }

    pub fn hide(&self) {
        self.update(|state| state.open = false);
    }

    pub fn current(&self) -> SnackbarState {
        self.inner
            .lock()
            .map(|inner| inner.state.clone())
            .unwrap_or_default()
    }

    fn update(&self, mutate: impl FnOnce(&mut SnackbarState)) {
        // Listeners run outside the lock so they may call back into the snackbar.
        let (state, listeners) = {
            let Ok(mut inner) = self.inner.lock() else {
                tracing::warn!("Snackbar lock poisoned, dropping update");
                return;
            };
            mutate(&mut inner.state);
            let listeners: Vec<Listener> = inner.listeners.values().cloned().collect();
            (inner.state.clone(), listeners)
        };

        for listener in listeners {
            listener(&state);
        }
    }
}

pub fn send_desktop_notification(state: &SnackbarState) -> Result<()> {
    let summary = match state.kind {
        SnackbarKind::Success => "Navigator: ready",
        SnackbarKind::Error => "Navigator: failed",
        SnackbarKind::Warning => "Navigator: warning",
        SnackbarKind::Info => "Navigator",
    };

    Notification::new()
        .summary(summary)
        .body(&state.message)
        .appname("navigator-poller")
        .timeout(notify_rust::Timeout::Milliseconds(5000))
        .show()?;

    tracing::info!(kind = state.kind.name(), message = %state.message, "Sent desktop notification");

    Ok(())
}

/// Forwards every visible snackbar to the desktop notification daemon.
pub fn forward_to_desktop(snackbar: &Snackbar) -> SubscriptionId {
    snackbar.subscribe(|state| {
        if !state.open {
            return;
        }
        if let Err(e) = send_desktop_notification(state) {
            tracing::warn!(error = %e, "Failed to send desktop notification");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(snackbar: &Snackbar) -> (SubscriptionId, Arc<Mutex<Vec<SnackbarState>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let id = snackbar.subscribe(move |state| sink.lock().unwrap().push(state.clone()));
        (id, seen)
    }

    #[test]
    fn test_initially_hidden() {
        let snackbar = Snackbar::new();
        assert!(!snackbar.current().open);
        assert!(snackbar.current().message.is_empty());
    }

    #[test]
    fn test_show_replaces_current() {
        let snackbar = Snackbar::new();
        snackbar.show("Report R1 is ready", SnackbarKind::Success);
        snackbar.show("Task T1 failed", SnackbarKind::Error);

        let current = snackbar.current();
        assert!(current.open);
        assert_eq!(current.message, "Task T1 failed");
        assert_eq!(current.kind, SnackbarKind::Error);
    }

    #[test]
    fn test_hide_keeps_last_message() {
        let snackbar = Snackbar::new();
        snackbar.show("Report R1 is ready", SnackbarKind::Success);
        snackbar.hide();

        let current = snackbar.current();
        assert!(!current.open);
        assert_eq!(current.message, "Report R1 is ready");
    }

    #[test]
    fn test_subscribers_receive_every_change() {
        let snackbar = Snackbar::new();
        let (_, seen) = recorder(&snackbar);

        snackbar.show("one", SnackbarKind::Info);
        snackbar.hide();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].open);
        assert!(!seen[1].open);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let snackbar = Snackbar::new();
        let (id, seen) = recorder(&snackbar);

        assert!(snackbar.unsubscribe(id));
        assert!(!snackbar.unsubscribe(id));

        snackbar.show("ignored", SnackbarKind::Warning);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_listener_may_hide_from_callback() {
        let snackbar = Snackbar::new();
        let handle = snackbar.clone();
        snackbar.subscribe(move |state| {
            if state.open && state.kind == SnackbarKind::Info {
                handle.hide();
            }
        });

        snackbar.show("transient", SnackbarKind::Info);
        assert!(!snackbar.current().open);
    }
}
