use async_trait::async_trait;

use crate::hold::HoldStatus;
use crate::seat::{NewPurchase, Purchase, Seat, SeatId, SeatState};
use crate::SeatResult;

/// Everything the request surface may ask of the seat domain.
#[async_trait]
pub trait SeatService: Send + Sync {
    async fn list_seats(&self) -> SeatResult<Vec<Seat>>;
    async fn get_seat(&self, id: SeatId) -> SeatResult<Seat>;
    async fn create_seat(&self, number: i32) -> SeatResult<Seat>;
    async fn delete_seat(&self, id: SeatId) -> SeatResult<()>;

    async fn reserve(&self, seat_id: SeatId, token: &str) -> SeatResult<()>;
    async fn unreserve(&self, seat_id: SeatId, token: &str) -> SeatResult<()>;
    async fn buy(&self, purchase: NewPurchase, token: &str) -> SeatResult<()>;
    async fn cancel_purchase(&self, seat_id: SeatId) -> SeatResult<()>;

    async fn resolve_hold(&self, seat_id: SeatId, token: &str) -> SeatResult<HoldStatus>;
    async fn seat_state(&self, seat_id: SeatId, token: &str) -> SeatResult<SeatState>;
    async fn list_purchases(&self) -> SeatResult<Vec<Purchase>>;
    async fn audit(&self) -> SeatResult<Vec<SeatId>>;
}
