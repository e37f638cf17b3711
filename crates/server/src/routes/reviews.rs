use axum::{extract::State, routing::post, Json, Router};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    config::ReviewPolicy,
    db::models::{Review, Role},
    error::{AppError, Result},
    middleware::auth::AuthUser,
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(create_review))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReviewRequest {
    pub tutor_user_id: String,
    pub rating: i32,
    pub comment: Option<String>,
}

async fn create_review(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<CreateReviewRequest>,
) -> Result<Json<Review>> {
    user.require(Role::Student)?;

    if !(1..=5).contains(&body.rating) {
        return Err(AppError::Validation(
            "Rating must be between 1 and 5".to_string(),
        ));
    }

    let tutor_exists = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM tutor_profiles WHERE user_id = ?",
    )
    .bind(&body.tutor_user_id)
    .fetch_one(&state.db.pool)
    .await?;

    if tutor_exists == 0 {
        return Err(AppError::NotFound("Tutor not found".to_string()));
    }

    if state.config.review_policy == ReviewPolicy::OnePerCompletedBooking {
        let completed = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM bookings \
             WHERE student_id = ? AND tutor_id = ? AND status = 'COMPLETED'",
        )
        .bind(&user.id)
        .bind(&body.tutor_user_id)
        .fetch_one(&state.db.pool)
        .await?;

        let submitted =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM reviews WHERE student_id = ? AND tutor_id = ?")
                .bind(&user.id)
                .bind(&body.tutor_user_id)
                .fetch_one(&state.db.pool)
                .await?;

        if submitted >= completed {
            return Err(AppError::Conflict(
                "One review per completed booking".to_string(),
            ));
        }
    }

    let review = Review {
        id: Uuid::new_v4().to_string(),
        student_id: user.id,
        tutor_id: body.tutor_user_id,
        rating: body.rating,
        comment: body.comment,
        created_at: Utc::now(),
    };

    // Insert and recompute inside one transaction so the new mean always
    // includes the review that triggered it
    let mut tx = state.db.pool.begin().await?;

    sqlx::query(
        "INSERT INTO reviews (id, student_id, tutor_id, rating, comment, created_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&review.id)
    .bind(&review.student_id)
    .bind(&review.tutor_id)
    .bind(review.rating)
    .bind(&review.comment)
    .bind(review.created_at.to_rfc3339())
    .execute(&mut *tx)
    .await?;

    let average = sqlx::query_scalar::<_, Option<f64>>(
        "SELECT AVG(rating) FROM reviews WHERE tutor_id = ?",
    )
    .bind(&review.tutor_id)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("UPDATE tutor_profiles SET rating = ? WHERE user_id = ?")
        .bind(average.unwrap_or(0.0))
        .bind(&review.tutor_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(Json(review))
}
