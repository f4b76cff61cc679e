use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Duration;

use crate::hold::HoldStatus;
use crate::seat::{NewPurchase, Purchase, Seat, SeatId};
use crate::SeatResult;

/// Durable record of seats and completed purchases.
#[async_trait]
pub trait SeatLedger: Send + Sync {
    /// All seats, ordered by id.
    async fn list_seats(&self) -> SeatResult<Vec<Seat>>;

    /// Fails with `NotFound` when the id does not exist.
    async fn get_seat(&self, id: SeatId) -> SeatResult<Seat>;

    /// Inserts a new seat with `available = true`.
    async fn create_seat(&self, number: i32) -> SeatResult<Seat>;

    /// Idempotent flag update.
    async fn set_availability(&self, id: SeatId, available: bool) -> SeatResult<()>;

    /// Does not remove purchase rows for the seat.
    async fn delete_seat(&self, id: SeatId) -> SeatResult<()>;

    /// `NotFound` for an unknown seat. A seat holds at most one purchase row;
    /// a second one is refused with `Conflict(SeatNotAvailable)`.
    async fn record_purchase(&self, purchase: &NewPurchase) -> SeatResult<()>;

    /// Removes every purchase row for the seat. `NotFound` if there were none.
    async fn delete_purchase(&self, seat_id: SeatId) -> SeatResult<()>;

    async fn list_purchases(&self) -> SeatResult<Vec<Purchase>>;

    /// Seats that have a purchase row but are still flagged available.
    async fn find_sold_but_available(&self) -> SeatResult<Vec<SeatId>>;
}

/// Ephemeral, self-expiring claims keyed by seat and caller token.
#[async_trait]
pub trait HoldStore: Send + Sync {
    /// Creates or overwrites the caller's hold with a fresh expiry.
    async fn set_hold(&self, seat_id: SeatId, token: &str, ttl: Duration) -> SeatResult<()>;

    /// No-op when the hold is absent.
    async fn delete_hold(&self, seat_id: SeatId, token: &str) -> SeatResult<()>;

    /// Tokens of every live hold on the seat, after a complete scan.
    async fn scan_holds(&self, seat_id: SeatId) -> SeatResult<HashSet<String>>;

    /// Sets the caller's hold only if the seat has no live holds, returning
    /// what was observed: `NoHold` means the hold was written.
    ///
    /// The default scans then writes as two separate calls, so two callers
    /// can both observe `NoHold` and both write. Stores with an atomic
    /// conditional set override this.
    async fn claim_hold(&self, seat_id: SeatId, token: &str, ttl: Duration) -> SeatResult<HoldStatus> {
        let status = HoldStatus::resolve(self.scan_holds(seat_id).await?, token);
        if status == HoldStatus::NoHold {
            self.set_hold(seat_id, token, ttl).await?;
        }
        Ok(status)
    }
}
