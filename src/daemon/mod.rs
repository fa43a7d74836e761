mod app;
mod dbus;
pub mod polling;

use crate::core::settings::Settings;
use anyhow::Result;

pub const DBUS_NAME: &str = "com.github.navigator.Poller";
pub const DBUS_PATH: &str = "/com/github/navigator/Poller";

pub async fn run(settings: Settings) -> Result<()> {
    tracing::info!("Starting navigator-poller daemon");
    app::run(settings).await
}
