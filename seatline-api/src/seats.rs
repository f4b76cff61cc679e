use std::convert::Infallible;

use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::{delete, get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

use seatline_core::events::{SeatEvent, SeatEventKind};
use seatline_core::{NewPurchase, Purchase, Seat, SeatId, SeatState};

use crate::error::AppError;
use crate::middleware::CallerToken;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateSeatRequest {
    pub number: i32,
}

#[derive(Debug, Deserialize)]
pub struct SeatRequest {
    pub id: SeatId,
}

#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    pub id: SeatId,
    pub fname: String,
    pub lname: String,
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HoldResponse {
    pub id: SeatId,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in_seconds: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct PurchaseResponse {
    pub id: SeatId,
    pub fname: String,
    pub lname: String,
    pub email: Option<String>,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct AuditResponse {
    pub inconsistent_seats: Vec<SeatId>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub seat_id: Option<SeatId>,
}

fn validate_seat_id(id: SeatId) -> Result<SeatId, AppError> {
    if id <= 0 {
        return Err(AppError::ValidationError("seat id must be a positive integer".to_string()));
    }
    Ok(id)
}

impl PurchaseRequest {
    fn into_purchase(self) -> Result<NewPurchase, AppError> {
        let seat_id = validate_seat_id(self.id)?;
        let fname = self.fname.trim().to_string();
        let lname = self.lname.trim().to_string();
        if fname.is_empty() || lname.is_empty() {
            return Err(AppError::ValidationError("fname and lname are required".to_string()));
        }
        let email = self
            .email
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty());

        Ok(NewPurchase { seat_id, fname, lname, email })
    }
}

fn publish(state: &AppState, seat_id: SeatId, kind: SeatEventKind) {
    // No subscribers is fine.
    let _ = state.events.send(SeatEvent::now(seat_id, kind));
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/seats", get(list_seats).post(create_seat))
        .route("/api/v1/seats/reserve", post(reserve_seat))
        .route("/api/v1/seats/unreserve", delete(unreserve_seat))
        .route("/api/v1/seats/buy", post(buy_seat))
        .route("/api/v1/seats/cancel", delete(cancel_purchase))
        .route("/api/v1/seats/purchases", get(list_purchases))
        .route("/api/v1/seats/audit", get(audit))
        .route("/api/v1/seats/stream", get(stream_events))
        .route("/api/v1/seats/{id}", get(get_seat).delete(delete_seat))
        .route("/api/v1/seats/{id}/state", get(seat_state))
}

// ============================================================================
// Seat Administration
// ============================================================================

/// GET /api/v1/seats
async fn list_seats(State(state): State<AppState>) -> Result<Json<Vec<Seat>>, AppError> {
    Ok(Json(state.seats.list_seats().await?))
}

/// GET /api/v1/seats/{id}
async fn get_seat(
    State(state): State<AppState>,
    Path(id): Path<SeatId>,
) -> Result<Json<Seat>, AppError> {
    let id = validate_seat_id(id)?;
    Ok(Json(state.seats.get_seat(id).await?))
}

/// POST /api/v1/seats
async fn create_seat(
    State(state): State<AppState>,
    Json(req): Json<CreateSeatRequest>,
) -> Result<Json<Seat>, AppError> {
    let seat = state.seats.create_seat(req.number).await?;
    publish(&state, seat.id, SeatEventKind::Created);
    Ok(Json(seat))
}

/// DELETE /api/v1/seats/{id}
async fn delete_seat(
    State(state): State<AppState>,
    Path(id): Path<SeatId>,
) -> Result<Json<MessageResponse>, AppError> {
    let id = validate_seat_id(id)?;
    state.seats.delete_seat(id).await?;
    publish(&state, id, SeatEventKind::Deleted);
    Ok(Json(MessageResponse { message: "Seat deleted successfully".to_string() }))
}

// ============================================================================
// Holds and Purchases
// ============================================================================

/// POST /api/v1/seats/reserve
async fn reserve_seat(
    State(state): State<AppState>,
    Extension(CallerToken(token)): Extension<CallerToken>,
    Json(req): Json<SeatRequest>,
) -> Result<Json<HoldResponse>, AppError> {
    let id = validate_seat_id(req.id)?;
    state.seats.reserve(id, &token).await?;
    publish(&state, id, SeatEventKind::Held);

    Ok(Json(HoldResponse {
        id,
        status: "HELD",
        expires_in_seconds: Some(state.hold_ttl_seconds),
    }))
}

/// DELETE /api/v1/seats/unreserve
async fn unreserve_seat(
    State(state): State<AppState>,
    Extension(CallerToken(token)): Extension<CallerToken>,
    Json(req): Json<SeatRequest>,
) -> Result<Json<HoldResponse>, AppError> {
    let id = validate_seat_id(req.id)?;
    state.seats.unreserve(id, &token).await?;
    publish(&state, id, SeatEventKind::Released);

    Ok(Json(HoldResponse { id, status: "RELEASED", expires_in_seconds: None }))
}

/// POST /api/v1/seats/buy
async fn buy_seat(
    State(state): State<AppState>,
    Extension(CallerToken(token)): Extension<CallerToken>,
    Json(req): Json<PurchaseRequest>,
) -> Result<Json<PurchaseResponse>, AppError> {
    let purchase = req.into_purchase()?;
    let id = purchase.seat_id;
    state.seats.buy(purchase.clone(), &token).await?;
    publish(&state, id, SeatEventKind::Purchased);

    Ok(Json(PurchaseResponse {
        id,
        fname: purchase.fname,
        lname: purchase.lname,
        email: purchase.email,
        status: "PURCHASED",
    }))
}

/// DELETE /api/v1/seats/cancel
async fn cancel_purchase(
    State(state): State<AppState>,
    Json(req): Json<SeatRequest>,
) -> Result<Json<HoldResponse>, AppError> {
    let id = validate_seat_id(req.id)?;
    state.seats.cancel_purchase(id).await?;
    publish(&state, id, SeatEventKind::PurchaseCancelled);

    Ok(Json(HoldResponse { id, status: "CANCELLED", expires_in_seconds: None }))
}

/// GET /api/v1/seats/{id}/state
async fn seat_state(
    State(state): State<AppState>,
    Extension(CallerToken(token)): Extension<CallerToken>,
    Path(id): Path<SeatId>,
) -> Result<Json<SeatState>, AppError> {
    let id = validate_seat_id(id)?;
    Ok(Json(state.seats.seat_state(id, &token).await?))
}

/// GET /api/v1/seats/purchases
async fn list_purchases(State(state): State<AppState>) -> Result<Json<Vec<Purchase>>, AppError> {
    Ok(Json(state.seats.list_purchases().await?))
}

/// GET /api/v1/seats/audit
async fn audit(State(state): State<AppState>) -> Result<Json<AuditResponse>, AppError> {
    let inconsistent_seats = state.seats.audit().await?;
    Ok(Json(AuditResponse { inconsistent_seats }))
}

/// GET /api/v1/seats/stream
async fn stream_events(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.events.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(move |result| {
        // Lagged receivers skip what they missed.
        let event = result.ok()?;
        if query.seat_id.is_some_and(|id| id != event.seat_id) {
            return None;
        }
        let data = serde_json::to_string(&event).ok()?;
        Some(Ok(Event::default().event("seat").data(data)))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
