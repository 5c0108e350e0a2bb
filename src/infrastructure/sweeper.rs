use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::services::TransactionService;

/// Runs the overdue sweep every `period` until the runtime shuts down. A failed
/// sweep is logged and retried on the next tick.
pub async fn run_overdue_sweeper(service: TransactionService, period: Duration) {
    tracing::info!("⏰ Overdue sweeper started (every {}s)", period.as_secs());

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match service.sweep_overdue().await {
            Ok(0) => tracing::debug!("Overdue sweep: nothing to reclassify"),
            Ok(marked) => tracing::info!("⏰ Overdue sweep marked {} transaction(s)", marked),
            Err(e) => tracing::error!("❌ Overdue sweep failed: {}", e),
        }
    }
}
