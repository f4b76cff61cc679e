use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::seat::SeatId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeatEventKind {
    Held,
    Released,
    Purchased,
    PurchaseCancelled,
    Created,
    Deleted,
}

/// Broadcast to seat-map watchers after a successful transition. Carries no
/// caller identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatEvent {
    pub seat_id: SeatId,
    pub kind: SeatEventKind,
    pub at: i64, // Unix timestamp
}

impl SeatEvent {
    pub fn now(seat_id: SeatId, kind: SeatEventKind) -> Self {
        Self { seat_id, kind, at: Utc::now().timestamp() }
    }
}
