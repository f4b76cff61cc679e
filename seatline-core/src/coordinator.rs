use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::hold::{HoldPolicy, HoldStatus};
use crate::repository::{HoldStore, SeatLedger};
use crate::seat::{NewPurchase, Purchase, Seat, SeatId, SeatState};
use crate::service::SeatService;
use crate::{ConflictReason, SeatError, SeatResult};

/// Keeps seat state consistent across the durable ledger and the expiring
/// hold store.
///
/// Holds no locks of its own. Every operation re-reads the stores, so a hold
/// that expired between two calls is never trusted.
#[derive(Clone)]
pub struct ReservationCoordinator {
    ledger: Arc<dyn SeatLedger>,
    holds: Arc<dyn HoldStore>,
    policy: HoldPolicy,
}

impl ReservationCoordinator {
    pub fn new(ledger: Arc<dyn SeatLedger>, holds: Arc<dyn HoldStore>, policy: HoldPolicy) -> Self {
        Self { ledger, holds, policy }
    }

    pub fn policy(&self) -> HoldPolicy {
        self.policy
    }

    /// The single place where "any live key is contention" is decided.
    /// A failed scan propagates; it is never read as `NoHold`.
    pub async fn resolve_hold(&self, seat_id: SeatId, token: &str) -> SeatResult<HoldStatus> {
        let tokens = self.holds.scan_holds(seat_id).await?;
        Ok(HoldStatus::resolve(tokens, token))
    }

    pub async fn reserve(&self, seat_id: SeatId, token: &str) -> SeatResult<()> {
        let seat = self.ledger.get_seat(seat_id).await?;
        if !seat.available {
            debug!(seat_id, "Reserve refused, seat sold");
            return Err(ConflictReason::SeatNotAvailable.into());
        }

        match self.holds.claim_hold(seat_id, token, self.policy.ttl()).await? {
            HoldStatus::NoHold => {
                info!(seat_id, ttl_seconds = self.policy.ttl_seconds, "Seat held");
                Ok(())
            }
            HoldStatus::ForeignHold => {
                debug!(seat_id, "Reserve refused, held by another caller");
                Err(ConflictReason::ReservedByOther.into())
            }
            HoldStatus::OwnHold => {
                debug!(seat_id, "Reserve refused, caller already holds seat");
                Err(ConflictReason::ReservedByYou.into())
            }
        }
    }

    pub async fn unreserve(&self, seat_id: SeatId, token: &str) -> SeatResult<()> {
        if self.resolve_hold(seat_id, token).await? == HoldStatus::ForeignHold {
            debug!(seat_id, "Unreserve refused, held by another caller");
            return Err(ConflictReason::NotReservedByYou.into());
        }

        self.holds.delete_hold(seat_id, token).await?;
        info!(seat_id, "Seat hold released");
        Ok(())
    }

    /// Records the purchase, then marks the seat unavailable. The two writes
    /// are not transactional; if the second fails the purchase row stays and
    /// the error is `PartialFailure`. `audit` finds such seats afterwards.
    ///
    /// A sold seat is refused even while the caller still holds a key for it,
    /// and the ledger refuses a second purchase row for a seat, so retrying
    /// after a partial failure cannot sell the seat twice.
    pub async fn buy(&self, purchase: NewPurchase, token: &str) -> SeatResult<()> {
        let seat_id = purchase.seat_id;
        let seat = self.ledger.get_seat(seat_id).await?;
        if !seat.available {
            debug!(seat_id, "Buy refused, seat sold");
            return Err(ConflictReason::SeatNotAvailable.into());
        }

        match self.resolve_hold(seat_id, token).await? {
            HoldStatus::ForeignHold => {
                debug!(seat_id, "Buy refused, held by another caller");
                return Err(ConflictReason::BuyReservedByOther.into());
            }
            HoldStatus::NoHold => {
                debug!(seat_id, "Buy refused, seat not held");
                return Err(ConflictReason::NotReserved.into());
            }
            HoldStatus::OwnHold => {}
        }

        self.ledger.record_purchase(&purchase).await?;

        if let Err(e) = self.ledger.set_availability(seat_id, false).await {
            error!(seat_id, error = %e, "Purchase recorded but seat still marked available");
            return Err(SeatError::PartialFailure { seat_id, reason: e.to_string() });
        }

        // A leftover key cannot be used to buy again; the flag check above
        // refuses it until the TTL removes it.
        if let Err(e) = self.holds.delete_hold(seat_id, token).await {
            warn!(seat_id, error = %e, "Failed to consume hold after purchase");
        }

        info!(seat_id, "Seat purchased");
        Ok(())
    }

    /// Deletes the purchase rows. Availability is left as it is.
    pub async fn cancel_purchase(&self, seat_id: SeatId) -> SeatResult<()> {
        self.ledger.delete_purchase(seat_id).await?;
        info!(seat_id, "Purchase cancelled");
        Ok(())
    }

    pub async fn seat_state(&self, seat_id: SeatId, token: &str) -> SeatResult<SeatState> {
        let seat = self.ledger.get_seat(seat_id).await?;
        if !seat.available {
            return Ok(SeatState::Sold);
        }

        Ok(match self.resolve_hold(seat_id, token).await? {
            HoldStatus::NoHold => SeatState::Open,
            HoldStatus::OwnHold => SeatState::Held { own: true },
            HoldStatus::ForeignHold => SeatState::Held { own: false },
        })
    }

    pub async fn audit(&self) -> SeatResult<Vec<SeatId>> {
        self.ledger.find_sold_but_available().await
    }
}

#[async_trait]
impl SeatService for ReservationCoordinator {
    async fn list_seats(&self) -> SeatResult<Vec<Seat>> {
        self.ledger.list_seats().await
    }

    async fn get_seat(&self, id: SeatId) -> SeatResult<Seat> {
        self.ledger.get_seat(id).await
    }

    async fn create_seat(&self, number: i32) -> SeatResult<Seat> {
        let seat = self.ledger.create_seat(number).await?;
        info!(seat_id = seat.id, number, "Seat created");
        Ok(seat)
    }

    async fn delete_seat(&self, id: SeatId) -> SeatResult<()> {
        self.ledger.delete_seat(id).await?;
        info!(seat_id = id, "Seat deleted");
        Ok(())
    }

    async fn reserve(&self, seat_id: SeatId, token: &str) -> SeatResult<()> {
        ReservationCoordinator::reserve(self, seat_id, token).await
    }

    async fn unreserve(&self, seat_id: SeatId, token: &str) -> SeatResult<()> {
        ReservationCoordinator::unreserve(self, seat_id, token).await
    }

    async fn buy(&self, purchase: NewPurchase, token: &str) -> SeatResult<()> {
        ReservationCoordinator::buy(self, purchase, token).await
    }

    async fn cancel_purchase(&self, seat_id: SeatId) -> SeatResult<()> {
        ReservationCoordinator::cancel_purchase(self, seat_id).await
    }

    async fn resolve_hold(&self, seat_id: SeatId, token: &str) -> SeatResult<HoldStatus> {
        ReservationCoordinator::resolve_hold(self, seat_id, token).await
    }

    async fn seat_state(&self, seat_id: SeatId, token: &str) -> SeatResult<SeatState> {
        ReservationCoordinator::seat_state(self, seat_id, token).await
    }

    async fn list_purchases(&self) -> SeatResult<Vec<Purchase>> {
        self.ledger.list_purchases().await
    }

    async fn audit(&self) -> SeatResult<Vec<SeatId>> {
        ReservationCoordinator::audit(self).await
    }
}
