use std::sync::Arc;
use tokio::sync::broadcast;

use seatline_core::events::SeatEvent;
use seatline_core::SeatService;
use seatline_store::app_config::SessionConfig;

#[derive(Clone)]
pub struct AppState {
    pub seats: Arc<dyn SeatService>,
    pub events: broadcast::Sender<SeatEvent>,
    pub session: SessionConfig,
    pub hold_ttl_seconds: u64,
    pub allowed_origins: Vec<String>,
}
