use axum::{
    extract::{Path, State},
    routing::{delete, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    db::models::{AvailabilitySlot, Role, TutorProfile},
    error::{AppError, Result},
    middleware::auth::AuthUser,
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", put(update_profile))
        .route("/availability", post(create_slot))
        .route("/availability/:slot_id", delete(delete_slot))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub subjects: Option<String>,
    pub bio: Option<String>,
    pub hourly_rate: Option<f64>,
    pub location: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSlotRequest {
    pub start: String,
    pub end: String,
}

async fn update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<Json<TutorProfile>> {
    user.require(Role::Tutor)?;

    if let Some(rate) = body.hourly_rate {
        if rate < 0.0 {
            return Err(AppError::Validation(
                "Hourly rate must be non-negative".to_string(),
            ));
        }
    }

    let profile = sqlx::query_as::<_, TutorProfile>(
        "SELECT id, user_id, subjects, location, hourly_rate, bio, rating, created_at \
         FROM tutor_profiles WHERE user_id = ?",
    )
    .bind(&user.id)
    .fetch_optional(&state.db.pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Tutor profile not found".to_string()))?;

    // Absent fields keep their current values
    let subjects = body.subjects.unwrap_or(profile.subjects);
    let bio = body.bio.unwrap_or(profile.bio);
    let hourly_rate = body.hourly_rate.unwrap_or(profile.hourly_rate);
    let location = body.location.unwrap_or(profile.location);

    sqlx::query(
        "UPDATE tutor_profiles SET subjects = ?, bio = ?, hourly_rate = ?, location = ? WHERE id = ?",
    )
    .bind(&subjects)
    .bind(&bio)
    .bind(hourly_rate)
    .bind(&location)
    .bind(&profile.id)
    .execute(&state.db.pool)
    .await?;

    Ok(Json(TutorProfile {
        subjects,
        bio,
        hourly_rate,
        location,
        id: profile.id,
        user_id: profile.user_id,
        rating: profile.rating,
        created_at: profile.created_at,
    }))
}

async fn create_slot(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<CreateSlotRequest>,
) -> Result<Json<AvailabilitySlot>> {
    user.require(Role::Tutor)?;

    let start = DateTime::parse_from_rfc3339(&body.start)
        .map_err(|_| AppError::Validation("start must be an RFC 3339 timestamp".to_string()))?
        .with_timezone(&Utc);
    let end = DateTime::parse_from_rfc3339(&body.end)
        .map_err(|_| AppError::Validation("end must be an RFC 3339 timestamp".to_string()))?
        .with_timezone(&Utc);

    if start >= end {
        return Err(AppError::Validation(
            "start must be before end".to_string(),
        ));
    }

    let profile_id =
        sqlx::query_scalar::<_, String>("SELECT id FROM tutor_profiles WHERE user_id = ?")
            .bind(&user.id)
            .fetch_optional(&state.db.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Tutor profile not found".to_string()))?;

    let slot = AvailabilitySlot {
        id: Uuid::new_v4().to_string(),
        tutor_profile_id: profile_id,
        start_time: start,
        end_time: end,
        is_booked: false,
        created_at: Utc::now(),
    };

    sqlx::query(
        "INSERT INTO availability_slots (id, tutor_profile_id, start_time, end_time, is_booked, created_at) \
         VALUES (?, ?, ?, ?, 0, ?)",
    )
    .bind(&slot.id)
    .bind(&slot.tutor_profile_id)
    .bind(slot.start_time.to_rfc3339())
    .bind(slot.end_time.to_rfc3339())
    .bind(slot.created_at.to_rfc3339())
    .execute(&state.db.pool)
    .await?;

    Ok(Json(slot))
}

async fn delete_slot(
    State(state): State<AppState>,
    user: AuthUser,
    Path(slot_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    user.require(Role::Tutor)?;

    // Booked slots are consumed, never deleted
    let result = sqlx::query(
        "DELETE FROM availability_slots WHERE id = ? AND is_booked = 0 \
         AND tutor_profile_id IN (SELECT id FROM tutor_profiles WHERE user_id = ?)",
    )
    .bind(&slot_id)
    .bind(&user.id)
    .execute(&state.db.pool)
    .await?;

    if result.rows_affected() == 0 {
        let booked = sqlx::query_scalar::<_, bool>(
            "SELECT s.is_booked FROM availability_slots s \
             JOIN tutor_profiles tp ON tp.id = s.tutor_profile_id \
             WHERE s.id = ? AND tp.user_id = ?",
        )
        .bind(&slot_id)
        .bind(&user.id)
        .fetch_optional(&state.db.pool)
        .await?;

        return match booked {
            Some(true) => Err(AppError::Conflict("Slot is already booked".to_string())),
            _ => Err(AppError::NotFound("Slot not found".to_string())),
        };
    }

    Ok(Json(serde_json::json!({ "ok": true })))
}
