use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type SeatId = i32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seat {
    pub id: SeatId,
    pub number: i32,
    #[serde(rename = "is_available")]
    pub available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A completed purchase. Permanent, unlike a hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: i32,
    pub seat_id: SeatId,
    pub fname: String,
    pub lname: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPurchase {
    pub seat_id: SeatId,
    pub fname: String,
    pub lname: String,
    pub email: Option<String>,
}

/// Per-seat state, derived from the ledger flag and the live holds at query
/// time. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatState {
    Open,
    Held { own: bool },
    Sold,
}
