use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    db::models::{AvailabilitySlot, Review, Role, TutorProfile},
    error::{AppError, Result},
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tutors))
        .route("/:id", get(get_tutor))
}

#[derive(Debug, Deserialize)]
pub struct TutorSearchParams {
    pub q: Option<String>,
    pub subject: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TutorSummary {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub profile: TutorProfile,
}

#[derive(Debug, Serialize)]
pub struct TutorDetail {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub profile: TutorProfile,
    pub availability: Vec<AvailabilitySlot>,
    pub reviews: Vec<Review>,
}

async fn list_tutors(
    State(state): State<AppState>,
    Query(params): Query<TutorSearchParams>,
) -> Result<Json<Vec<TutorSummary>>> {
    let q = params.q.unwrap_or_default();
    let subject = params.subject.unwrap_or_default();
    let location = params.location.unwrap_or_default();

    // Empty filters match everything; LIKE on SQLite is case-insensitive for ASCII
    let rows = sqlx::query_as::<_, (String, String, String, Role, String, String, String, f64, String, f64, DateTime<Utc>)>(
        "SELECT u.id, u.name, u.email, u.role, \
                tp.id, tp.subjects, tp.location, tp.hourly_rate, tp.bio, tp.rating, tp.created_at \
         FROM users u \
         JOIN tutor_profiles tp ON tp.user_id = u.id \
         WHERE u.role = 'TUTOR' \
           AND (? = '' OR u.name LIKE '%' || ? || '%') \
           AND (? = '' OR tp.subjects LIKE '%' || ? || '%') \
           AND (? = '' OR tp.location LIKE '%' || ? || '%') \
         ORDER BY u.name ASC",
    )
    .bind(&q)
    .bind(&q)
    .bind(&subject)
    .bind(&subject)
    .bind(&location)
    .bind(&location)
    .fetch_all(&state.db.pool)
    .await?;

    let tutors = rows
        .into_iter()
        .map(
            |(id, name, email, role, profile_id, subjects, location, hourly_rate, bio, rating, profile_created_at)| {
                TutorSummary {
                    profile: TutorProfile {
                        id: profile_id,
                        user_id: id.clone(),
                        subjects,
                        location,
                        hourly_rate,
                        bio,
                        rating,
                        created_at: profile_created_at,
                    },
                    id,
                    name,
                    email,
                    role,
                }
            },
        )
        .collect();

    Ok(Json(tutors))
}

async fn get_tutor(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TutorDetail>> {
    let user = sqlx::query_as::<_, (String, String, String, Role)>(
        "SELECT id, name, email, role FROM users WHERE id = ? AND role = 'TUTOR'",
    )
    .bind(&id)
    .fetch_optional(&state.db.pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Tutor not found".to_string()))?;

    let (user_id, name, email, role) = user;

    let profile = sqlx::query_as::<_, TutorProfile>(
        "SELECT id, user_id, subjects, location, hourly_rate, bio, rating, created_at \
         FROM tutor_profiles WHERE user_id = ?",
    )
    .bind(&user_id)
    .fetch_optional(&state.db.pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Tutor profile not found".to_string()))?;

    let availability = sqlx::query_as::<_, AvailabilitySlot>(
        "SELECT id, tutor_profile_id, start_time, end_time, is_booked, created_at \
         FROM availability_slots WHERE tutor_profile_id = ? ORDER BY start_time ASC",
    )
    .bind(&profile.id)
    .fetch_all(&state.db.pool)
    .await?;

    let reviews = sqlx::query_as::<_, Review>(
        "SELECT id, student_id, tutor_id, rating, comment, created_at \
         FROM reviews WHERE tutor_id = ? ORDER BY created_at DESC",
    )
    .bind(&user_id)
    .fetch_all(&state.db.pool)
    .await?;

    Ok(Json(TutorDetail {
        id: user_id,
        name,
        email,
        role,
        profile,
        availability,
        reviews,
    }))
}
