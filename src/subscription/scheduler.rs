//! Periodic background updates.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info};

use super::service::SubscriptionService;

/// Run the update cycle every `period`, first after one full period.
///
/// The config list is re-read on every tick so `POST /api/configs` applies to
/// the next run. Abort the returned handle to stop.
pub fn spawn_auto_update(
    service: SubscriptionService,
    configs: Arc<RwLock<Vec<String>>>,
    period: Duration,
) -> JoinHandle<()> {
    info!(?period, "auto update enabled");

    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            info!("running scheduled update");

            let names = configs.read().await.clone();
            match service.update(&names).await {
                Ok(summary) => info!(nodes = summary.nodes_count, "scheduled update finished"),
                Err(e) => error!(error = %e, "scheduled update failed"),
            }
        }
    })
}
