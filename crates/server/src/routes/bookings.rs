use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    db::models::{Booking, BookingStatus, Role},
    error::{AppError, Result},
    middleware::auth::AuthUser,
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_booking))
        .route("/me", get(my_bookings))
        .route("/:id/status", post(update_status))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub slot_id: String,
    pub tutor_user_id: String,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct PartyInfo {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotSummary {
    pub id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_booked: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingWithParties {
    pub id: String,
    pub student_id: String,
    pub tutor_id: String,
    pub slot_id: String,
    pub status: BookingStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub slot: SlotSummary,
    pub student: PartyInfo,
    pub tutor: PartyInfo,
}

async fn create_booking(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<CreateBookingRequest>,
) -> Result<Json<Booking>> {
    user.require(Role::Student)?;

    let mut tx = state.db.pool.begin().await?;

    // Claim the slot with a single conditional update. Two concurrent
    // requests cannot both observe is_booked = 0; the loser rolls back
    // with nothing written.
    let claimed =
        sqlx::query("UPDATE availability_slots SET is_booked = 1 WHERE id = ? AND is_booked = 0")
            .bind(&body.slot_id)
            .execute(&mut *tx)
            .await?;

    if claimed.rows_affected() == 0 {
        return Err(AppError::SlotUnavailable);
    }

    let booking = Booking {
        id: Uuid::new_v4().to_string(),
        student_id: user.id,
        tutor_id: body.tutor_user_id,
        slot_id: body.slot_id,
        status: BookingStatus::Pending,
        notes: body.notes,
        created_at: Utc::now(),
    };

    sqlx::query(
        "INSERT INTO bookings (id, student_id, tutor_id, slot_id, status, notes, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&booking.id)
    .bind(&booking.student_id)
    .bind(&booking.tutor_id)
    .bind(&booking.slot_id)
    .bind(booking.status)
    .bind(&booking.notes)
    .bind(booking.created_at.to_rfc3339())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(Json(booking))
}

async fn my_bookings(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<BookingWithParties>>> {
    let column = if user.role == Role::Student {
        "b.student_id"
    } else {
        "b.tutor_id"
    };

    let sql = format!(
        "SELECT b.id, b.student_id, b.tutor_id, b.slot_id, b.status, b.notes, b.created_at, \
                s.start_time, s.end_time, s.is_booked, su.name, tu.name \
         FROM bookings b \
         JOIN availability_slots s ON s.id = b.slot_id \
         JOIN users su ON su.id = b.student_id \
         JOIN users tu ON tu.id = b.tutor_id \
         WHERE {column} = ? \
         ORDER BY b.created_at DESC"
    );

    let rows = sqlx::query_as::<_, (
        String,
        String,
        String,
        String,
        BookingStatus,
        Option<String>,
        DateTime<Utc>,
        DateTime<Utc>,
        DateTime<Utc>,
        bool,
        String,
        String,
    )>(&sql)
    .bind(&user.id)
    .fetch_all(&state.db.pool)
    .await?;

    let bookings = rows
        .into_iter()
        .map(
            |(
                id,
                student_id,
                tutor_id,
                slot_id,
                status,
                notes,
                created_at,
                start_time,
                end_time,
                is_booked,
                student_name,
                tutor_name,
            )| {
                BookingWithParties {
                    slot: SlotSummary {
                        id: slot_id.clone(),
                        start_time,
                        end_time,
                        is_booked,
                    },
                    student: PartyInfo {
                        id: student_id.clone(),
                        name: student_name,
                    },
                    tutor: PartyInfo {
                        id: tutor_id.clone(),
                        name: tutor_name,
                    },
                    id,
                    student_id,
                    tutor_id,
                    slot_id,
                    status,
                    notes,
                    created_at,
                }
            },
        )
        .collect();

    Ok(Json(bookings))
}

async fn update_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<Json<Booking>> {
    let booking = sqlx::query_as::<_, Booking>(
        "SELECT id, student_id, tutor_id, slot_id, status, notes, created_at \
         FROM bookings WHERE id = ?",
    )
    .bind(&id)
    .fetch_optional(&state.db.pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

    // Only the tutor on this specific booking may move it
    if booking.tutor_id != user.id {
        return Err(AppError::Forbidden("Forbidden".to_string()));
    }

    let next = match body.status.as_str() {
        "PENDING" => BookingStatus::Pending,
        "CONFIRMED" => BookingStatus::Confirmed,
        "CANCELLED" => BookingStatus::Cancelled,
        "COMPLETED" => BookingStatus::Completed,
        _ => return Err(AppError::Validation("Invalid status".to_string())),
    };

    if !booking.status.can_transition_to(&next) {
        return Err(AppError::Validation(format!(
            "Cannot transition booking from {:?} to {:?}",
            booking.status, next
        )));
    }

    sqlx::query("UPDATE bookings SET status = ? WHERE id = ?")
        .bind(next)
        .bind(&booking.id)
        .execute(&state.db.pool)
        .await?;

    Ok(Json(Booking {
        status: next,
        ..booking
    }))
}
