use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};
use tourline_booking::BookingWorkflow;

/// Drive the time-based transitions (risk onset, discount expiry, unpaid
/// holds, completion) that no booking request would trigger.
pub async fn start_sweep_worker(workflow: Arc<BookingWorkflow>, every: Duration) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Sweep worker started, running every {:?}", every);

    loop {
        ticker.tick().await;
        if let Err(e) = workflow.sweep().await {
            error!("Sweep failed: {}", e);
        }
    }
}
