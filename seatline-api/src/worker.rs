use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info};

use seatline_core::{SeatId, SeatResult, SeatService};

/// Periodically looks for seats left sold-but-available by a half-finished
/// purchase and reports them. Never repairs anything.
pub async fn start_reconcile_worker(seats: Arc<dyn SeatService>, every: Duration) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Reconcile worker started, auditing every {:?}", every);

    loop {
        ticker.tick().await;
        if let Err(e) = reconcile_once(seats.as_ref()).await {
            error!("Seat audit failed: {}", e);
        }
    }
}

pub async fn reconcile_once(seats: &dyn SeatService) -> SeatResult<Vec<SeatId>> {
    let inconsistent = seats.audit().await?;
    for seat_id in &inconsistent {
        error!(seat_id, "Seat has a purchase record but is still marked available");
    }
    if inconsistent.is_empty() {
        info!("Seat audit clean");
    }
    Ok(inconsistent)
}
