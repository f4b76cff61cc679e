use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use seatline_core::{ConflictReason, NewPurchase, Purchase, Seat, SeatError, SeatId, SeatLedger, SeatResult};

pub struct PostgresSeatLedger {
    pool: PgPool,
}

impl PostgresSeatLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SeatRow {
    id: i32,
    number: i32,
    available: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<SeatRow> for Seat {
    fn from(row: SeatRow) -> Self {
        Seat {
            id: row.id,
            number: row.number,
            available: row.available,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PurchaseRow {
    id: i32,
    seat_id: i32,
    fname: String,
    lname: String,
    email: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PurchaseRow> for Purchase {
    fn from(row: PurchaseRow) -> Self {
        Purchase {
            id: row.id,
            seat_id: row.seat_id,
            fname: row.fname,
            lname: row.lname,
            email: row.email,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Maps driver failures onto the seat error taxonomy.
pub(crate) fn ledger_error(e: sqlx::Error) -> SeatError {
    match &e {
        sqlx::Error::RowNotFound => SeatError::NotFound("seat ledger row".to_string()),
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => SeatError::Unavailable(e.to_string()),
        _ => SeatError::Internal(e.to_string()),
    }
}

/// A second row for the same seat trips the unique index on `seat_id`.
fn purchase_error(e: sqlx::Error) -> SeatError {
    if is_unique_violation(&e) {
        ConflictReason::SeatNotAvailable.into()
    } else {
        ledger_error(e)
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

#[async_trait]
impl SeatLedger for PostgresSeatLedger {
    async fn list_seats(&self) -> SeatResult<Vec<Seat>> {
        let rows = sqlx::query_as::<_, SeatRow>(
            "SELECT id, number, available, created_at, updated_at FROM seats ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(ledger_error)?;

        Ok(rows.into_iter().map(Seat::from).collect())
    }

    async fn get_seat(&self, id: SeatId) -> SeatResult<Seat> {
        let row = sqlx::query_as::<_, SeatRow>(
            "SELECT id, number, available, created_at, updated_at FROM seats WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(ledger_error)?;

        row.map(Seat::from)
            .ok_or_else(|| SeatError::NotFound(format!("seat {}", id)))
    }

    async fn create_seat(&self, number: i32) -> SeatResult<Seat> {
        let row = sqlx::query_as::<_, SeatRow>(
            r#"
            INSERT INTO seats (number, available)
            VALUES ($1, TRUE)
            RETURNING id, number, available, created_at, updated_at
            "#,
        )
        .bind(number)
        .fetch_one(&self.pool)
        .await
        .map_err(ledger_error)?;

        Ok(row.into())
    }

    async fn set_availability(&self, id: SeatId, available: bool) -> SeatResult<()> {
        sqlx::query("UPDATE seats SET available = $1, updated_at = now() WHERE id = $2")
            .bind(available)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(ledger_error)?;

        Ok(())
    }

    async fn delete_seat(&self, id: SeatId) -> SeatResult<()> {
        sqlx::query("DELETE FROM seats WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(ledger_error)?;

        Ok(())
    }

    async fn record_purchase(&self, purchase: &NewPurchase) -> SeatResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO purchases (seat_id, fname, lname, email)
            SELECT $1, $2, $3, $4
            WHERE EXISTS (SELECT 1 FROM seats WHERE id = $1)
            "#,
        )
        .bind(purchase.seat_id)
        .bind(&purchase.fname)
        .bind(&purchase.lname)
        .bind(purchase.email.as_deref())
        .execute(&self.pool)
        .await
        .map_err(purchase_error)?;

        if result.rows_affected() == 0 {
            return Err(SeatError::NotFound(format!("seat {}", purchase.seat_id)));
        }
        Ok(())
    }

    async fn delete_purchase(&self, seat_id: SeatId) -> SeatResult<()> {
        let result = sqlx::query("DELETE FROM purchases WHERE seat_id = $1")
            .bind(seat_id)
            .execute(&self.pool)
            .await
            .map_err(ledger_error)?;

        if result.rows_affected() == 0 {
            return Err(SeatError::NotFound(format!("purchase for seat {}", seat_id)));
        }
        Ok(())
    }

    async fn list_purchases(&self) -> SeatResult<Vec<Purchase>> {
        let rows = sqlx::query_as::<_, PurchaseRow>(
            r#"
            SELECT id, seat_id, fname, lname, email, created_at, updated_at
            FROM purchases
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(ledger_error)?;

        Ok(rows.into_iter().map(Purchase::from).collect())
    }

    async fn find_sold_but_available(&self) -> SeatResult<Vec<SeatId>> {
        sqlx::query_scalar::<_, i32>(
            r#"
            SELECT DISTINCT p.seat_id
            FROM purchases p
            JOIN seats s ON s.id = p.seat_id
            WHERE s.available
            ORDER BY p.seat_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(ledger_error)
    }
}
