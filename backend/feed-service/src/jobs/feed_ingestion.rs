/// Periodic syndicated feed ingestion.
use crate::services::ingestion::IngestionService;
use std::sync::Arc;
use std::time::Duration;

pub async fn run_feed_ingestion_loop(service: Arc<IngestionService>, interval: Duration) {
    tracing::info!(interval_secs = interval.as_secs(), "feed ingestion job started");

    loop {
        tokio::time::sleep(interval).await;

        if let Err(err) = service.run().await {
            tracing::error!(error = %err, "feed ingestion run failed");
        }
    }
}
