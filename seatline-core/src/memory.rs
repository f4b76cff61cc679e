//! In-process stores for single-node runs and tests.
//!
//! Hold expiry is measured with `tokio::time::Instant`, so a paused test
//! clock controls it.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::hold::HoldStatus;
use crate::repository::{HoldStore, SeatLedger};
use crate::seat::{NewPurchase, Purchase, Seat, SeatId};
use crate::{ConflictReason, SeatError, SeatResult};

#[derive(Debug, Default)]
struct LedgerState {
    seats: BTreeMap<SeatId, Seat>,
    purchases: Vec<Purchase>,
    next_seat_id: SeatId,
    next_purchase_id: i32,
}

#[derive(Debug, Clone, Default)]
pub struct MemorySeatLedger {
    state: Arc<Mutex<LedgerState>>,
    unreachable: Arc<AtomicBool>,
    fail_availability: Arc<AtomicBool>,
}

impl MemorySeatLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call fail with `Unavailable` until switched back.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Makes `set_availability` fail with `Unavailable` while every other
    /// call keeps working.
    pub fn fail_availability_updates(&self, fail: bool) {
        self.fail_availability.store(fail, Ordering::SeqCst);
    }

    fn check_reachable(&self) -> SeatResult<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(SeatError::Unavailable("seat ledger unreachable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SeatLedger for MemorySeatLedger {
    async fn list_seats(&self) -> SeatResult<Vec<Seat>> {
        self.check_reachable()?;
        let state = self.state.lock().await;
        Ok(state.seats.values().cloned().collect())
    }

    async fn get_seat(&self, id: SeatId) -> SeatResult<Seat> {
        self.check_reachable()?;
        let state = self.state.lock().await;
        state
            .seats
            .get(&id)
            .cloned()
            .ok_or_else(|| SeatError::NotFound(format!("seat {}", id)))
    }

    async fn create_seat(&self, number: i32) -> SeatResult<Seat> {
        self.check_reachable()?;
        let mut state = self.state.lock().await;
        state.next_seat_id += 1;
        let now = Utc::now();
        let seat = Seat {
            id: state.next_seat_id,
            number,
            available: true,
            created_at: now,
            updated_at: now,
        };
        state.seats.insert(seat.id, seat.clone());
        Ok(seat)
    }

    async fn set_availability(&self, id: SeatId, available: bool) -> SeatResult<()> {
        self.check_reachable()?;
        if self.fail_availability.load(Ordering::SeqCst) {
            return Err(SeatError::Unavailable("seat ledger rejected availability update".to_string()));
        }
        let mut state = self.state.lock().await;
        if let Some(seat) = state.seats.get_mut(&id) {
            seat.available = available;
            seat.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn delete_seat(&self, id: SeatId) -> SeatResult<()> {
        self.check_reachable()?;
        let mut state = self.state.lock().await;
        state.seats.remove(&id);
        Ok(())
    }

    async fn record_purchase(&self, purchase: &NewPurchase) -> SeatResult<()> {
        self.check_reachable()?;
        let mut state = self.state.lock().await;
        if !state.seats.contains_key(&purchase.seat_id) {
            return Err(SeatError::NotFound(format!("seat {}", purchase.seat_id)));
        }
        if state.purchases.iter().any(|p| p.seat_id == purchase.seat_id) {
            return Err(ConflictReason::SeatNotAvailable.into());
        }
        state.next_purchase_id += 1;
        let now = Utc::now();
        let row = Purchase {
            id: state.next_purchase_id,
            seat_id: purchase.seat_id,
            fname: purchase.fname.clone(),
            lname: purchase.lname.clone(),
            email: purchase.email.clone(),
            created_at: now,
            updated_at: now,
        };
        state.purchases.push(row);
        Ok(())
    }

    async fn delete_purchase(&self, seat_id: SeatId) -> SeatResult<()> {
        self.check_reachable()?;
        let mut state = self.state.lock().await;
        let before = state.purchases.len();
        state.purchases.retain(|p| p.seat_id != seat_id);
        if state.purchases.len() == before {
            return Err(SeatError::NotFound(format!("purchase for seat {}", seat_id)));
        }
        Ok(())
    }

    async fn list_purchases(&self) -> SeatResult<Vec<Purchase>> {
        self.check_reachable()?;
        let state = self.state.lock().await;
        Ok(state.purchases.clone())
    }

    async fn find_sold_but_available(&self) -> SeatResult<Vec<SeatId>> {
        self.check_reachable()?;
        let state = self.state.lock().await;
        let mut ids: Vec<SeatId> = state
            .purchases
            .iter()
            .filter(|p| state.seats.get(&p.seat_id).is_some_and(|s| s.available))
            .map(|p| p.seat_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryHoldStore {
    holds: Arc<Mutex<HashMap<(SeatId, String), Instant>>>,
    unreachable: Arc<AtomicBool>,
}

impl MemoryHoldStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    fn check_reachable(&self) -> SeatResult<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(SeatError::Unavailable("hold store unreachable".to_string()));
        }
        Ok(())
    }

    /// Remaining lifetime of a live hold.
    pub async fn ttl(&self, seat_id: SeatId, token: &str) -> Option<Duration> {
        let holds = self.holds.lock().await;
        holds
            .get(&(seat_id, token.to_string()))
            .and_then(|expires_at| expires_at.checked_duration_since(Instant::now()))
            .filter(|left| !left.is_zero())
    }
}

fn live_tokens(holds: &mut HashMap<(SeatId, String), Instant>, seat_id: SeatId) -> HashSet<String> {
    let now = Instant::now();
    holds.retain(|_, expires_at| *expires_at > now);
    holds
        .keys()
        .filter(|(seat, _)| *seat == seat_id)
        .map(|(_, token)| token.clone())
        .collect()
}

#[async_trait]
impl HoldStore for MemoryHoldStore {
    async fn set_hold(&self, seat_id: SeatId, token: &str, ttl: Duration) -> SeatResult<()> {
        self.check_reachable()?;
        let mut holds = self.holds.lock().await;
        holds.insert((seat_id, token.to_string()), Instant::now() + ttl);
        Ok(())
    }

    async fn delete_hold(&self, seat_id: SeatId, token: &str) -> SeatResult<()> {
        self.check_reachable()?;
        let mut holds = self.holds.lock().await;
        holds.remove(&(seat_id, token.to_string()));
        Ok(())
    }

    async fn scan_holds(&self, seat_id: SeatId) -> SeatResult<HashSet<String>> {
        self.check_reachable()?;
        let mut holds = self.holds.lock().await;
        Ok(live_tokens(&mut holds, seat_id))
    }

    async fn claim_hold(&self, seat_id: SeatId, token: &str, ttl: Duration) -> SeatResult<HoldStatus> {
        self.check_reachable()?;
        let mut holds = self.holds.lock().await;
        let status = HoldStatus::resolve(live_tokens(&mut holds, seat_id), token);
        if status == HoldStatus::NoHold {
            holds.insert((seat_id, token.to_string()), Instant::now() + ttl);
        } else {
            debug!(seat_id, ?status, "Claim refused, seat already held");
        }
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_hold_expires_after_ttl() {
        let store = MemoryHoldStore::new();
        store.set_hold(3, "tok-A", Duration::from_secs(60)).await.unwrap();

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(store.scan_holds(3).await.unwrap().contains("tok-A"));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(store.scan_holds(3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_scan_is_scoped_to_seat() {
        let store = MemoryHoldStore::new();
        let ttl = Duration::from_secs(60);
        store.set_hold(1, "tok-A", ttl).await.unwrap();
        store.set_hold(11, "tok-B", ttl).await.unwrap();

        let tokens = store.scan_holds(1).await.unwrap();
        assert_eq!(tokens.len(), 1);
        assert!(tokens.contains("tok-A"));
    }

    #[tokio::test]
    async fn test_delete_absent_hold_is_noop() {
        let store = MemoryHoldStore::new();
        store.delete_hold(5, "nobody").await.unwrap();
    }

    #[tokio::test]
    async fn test_claim_refuses_when_other_holds() {
        let store = MemoryHoldStore::new();
        let ttl = Duration::from_secs(60);

        assert_eq!(store.claim_hold(2, "tok-A", ttl).await.unwrap(), HoldStatus::NoHold);
        assert_eq!(store.claim_hold(2, "tok-B", ttl).await.unwrap(), HoldStatus::ForeignHold);
        assert_eq!(store.claim_hold(2, "tok-A", ttl).await.unwrap(), HoldStatus::OwnHold);

        let tokens = store.scan_holds(2).await.unwrap();
        assert_eq!(tokens.len(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_store_errors() {
        let store = MemoryHoldStore::new();
        store.set_unreachable(true);
        let err = store.scan_holds(1).await.unwrap_err();
        assert!(matches!(err, SeatError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_ledger_detects_sold_but_available() {
        let ledger = MemorySeatLedger::new();
        let seat = ledger.create_seat(14).await.unwrap();
        let sold = ledger.create_seat(15).await.unwrap();

        for id in [seat.id, sold.id] {
            ledger
                .record_purchase(&NewPurchase {
                    seat_id: id,
                    fname: "Ann".to_string(),
                    lname: "Lee".to_string(),
                    email: None,
                })
                .await
                .unwrap();
        }
        ledger.set_availability(sold.id, false).await.unwrap();

        assert_eq!(ledger.find_sold_but_available().await.unwrap(), vec![seat.id]);
    }

    #[tokio::test]
    async fn test_second_purchase_row_for_seat_conflicts() {
        let ledger = MemorySeatLedger::new();
        let seat = ledger.create_seat(1).await.unwrap();
        let row = NewPurchase {
            seat_id: seat.id,
            fname: "Ann".to_string(),
            lname: "Lee".to_string(),
            email: None,
        };

        ledger.record_purchase(&row).await.unwrap();
        let err = ledger.record_purchase(&row).await.unwrap_err();
        assert!(err.is_conflict(ConflictReason::SeatNotAvailable));
        assert_eq!(ledger.list_purchases().await.unwrap().len(), 1);

        // Cancelling frees the seat for a new row.
        ledger.delete_purchase(seat.id).await.unwrap();
        ledger.record_purchase(&row).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_seat_leaves_purchase_rows() {
        let ledger = MemorySeatLedger::new();
        let seat = ledger.create_seat(1).await.unwrap();
        ledger
            .record_purchase(&NewPurchase {
                seat_id: seat.id,
                fname: "Ann".to_string(),
                lname: "Lee".to_string(),
                email: None,
            })
            .await
            .unwrap();

        ledger.delete_seat(seat.id).await.unwrap();

        assert!(matches!(ledger.get_seat(seat.id).await.unwrap_err(), SeatError::NotFound(_)));
        assert_eq!(ledger.list_purchases().await.unwrap().len(), 1);
        // Orphaned rows have no seat flag to disagree with.
        assert!(ledger.find_sold_but_available().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_purchase_without_row_is_not_found() {
        let ledger = MemorySeatLedger::new();
        let seat = ledger.create_seat(1).await.unwrap();
        let err = ledger.delete_purchase(seat.id).await.unwrap_err();
        assert!(matches!(err, SeatError::NotFound(_)));
    }
}
