pub mod coordinator;
pub mod events;
pub mod hold;
pub mod memory;
pub mod repository;
pub mod seat;
pub mod service;

pub use coordinator::ReservationCoordinator;
pub use hold::{HoldPolicy, HoldStatus};
pub use repository::{HoldStore, SeatLedger};
pub use seat::{NewPurchase, Purchase, Seat, SeatId, SeatState};
pub use service::SeatService;

/// Why a seat transition was refused. The display strings are part of the
/// public API contract and are returned verbatim to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConflictReason {
    #[error("seat is not available")]
    SeatNotAvailable,
    #[error("seat is already reserved by other user")]
    ReservedByOther,
    #[error("seat is already reserved by you")]
    ReservedByYou,
    #[error("seat is not reserved by you")]
    NotReservedByYou,
    #[error("can not buy that seat because it is reserved by other user")]
    BuyReservedByOther,
    #[error("can not buy that seat because it is not reserved")]
    NotReserved,
}

#[derive(Debug, thiserror::Error)]
pub enum SeatError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(ConflictReason),
    #[error("Purchase of seat {seat_id} recorded but seat state not updated: {reason}")]
    PartialFailure { seat_id: SeatId, reason: String },
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Internal store error: {0}")]
    Internal(String),
}

impl SeatError {
    pub fn is_conflict(&self, reason: ConflictReason) -> bool {
        matches!(self, SeatError::Conflict(r) if *r == reason)
    }
}

impl From<ConflictReason> for SeatError {
    fn from(reason: ConflictReason) -> Self {
        SeatError::Conflict(reason)
    }
}

pub type SeatResult<T> = Result<T, SeatError>;
