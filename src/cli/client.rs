use crate::daemon::{DBUS_NAME, DBUS_PATH};
use anyhow::{Context, Result};

/// Session-bus client for a running `navigator-poller daemon`.
pub struct DaemonClient {
    connection: zbus::Connection,
}

impl DaemonClient {
    pub async fn connect() -> Result<Self> {
        let connection = zbus::Connection::session()
            .await
            .context("Failed to connect to session D-Bus")?;
        Ok(Self { connection })
    }

    async fn call(&self, method: &str, arg: &str) -> Result<zbus::Message> {
        self.connection
            .call_method(Some(DBUS_NAME), DBUS_PATH, Some(DBUS_NAME), method, &(arg,))
            .await
            .with_context(|| format!("Failed to call {method} - is the daemon running?"))
    }

    pub async fn call_string(&self, method: &str, arg: &str) -> Result<String> {
        self.call(method, arg)
            .await?
            .body()
            .deserialize()
            .context("Failed to deserialize response")
    }

    pub async fn call_bool(&self, method: &str, arg: &str) -> Result<bool> {
        self.call(method, arg)
            .await?
            .body()
            .deserialize()
            .context("Failed to deserialize response")
    }

    pub async fn call_unit(&self, method: &str) -> Result<()> {
        let _reply: () = self
            .connection
            .call_method(Some(DBUS_NAME), DBUS_PATH, Some(DBUS_NAME), method, &())
            .await
            .with_context(|| format!("Failed to call {method} - is the daemon running?"))?
            .body()
            .deserialize()
            .context("Failed to deserialize response")?;
        Ok(())
    }
}
