/// Periodic feed plugin scheduler.
use crate::services::plugins::PluginRunner;
use std::sync::Arc;
use std::time::Duration;

pub async fn run_plugin_loop(runner: Arc<PluginRunner>, interval: Duration) {
    tracing::info!(interval_secs = interval.as_secs(), "plugin scheduler started");

    loop {
        tokio::time::sleep(interval).await;

        if let Err(err) = runner.run_due_plugins().await {
            tracing::error!(error = %err, "plugin scheduler run failed");
        }
    }
}
