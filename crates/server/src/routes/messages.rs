use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    db::models::Message,
    error::{AppError, Result},
    middleware::auth::AuthUser,
    services::relay::RelayEvent,
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/:with_user_id", get(conversation).post(send_message))
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

async fn conversation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(with_user_id): Path<String>,
) -> Result<Json<Vec<Message>>> {
    let messages = sqlx::query_as::<_, Message>(
        "SELECT id, sender_id, receiver_id, content, created_at FROM messages \
         WHERE (sender_id = ? AND receiver_id = ?) OR (sender_id = ? AND receiver_id = ?) \
         ORDER BY created_at ASC",
    )
    .bind(&user.id)
    .bind(&with_user_id)
    .bind(&with_user_id)
    .bind(&user.id)
    .fetch_all(&state.db.pool)
    .await?;

    Ok(Json(messages))
}

async fn send_message(
    State(state): State<AppState>,
    user: AuthUser,
    Path(with_user_id): Path<String>,
    Json(body): Json<SendMessageRequest>,
) -> Result<Json<Message>> {
    if body.content.trim().is_empty() {
        return Err(AppError::Validation(
            "Message content is required".to_string(),
        ));
    }

    let message = Message {
        id: Uuid::new_v4().to_string(),
        sender_id: user.id,
        receiver_id: with_user_id,
        content: body.content,
        created_at: Utc::now(),
    };

    sqlx::query(
        "INSERT INTO messages (id, sender_id, receiver_id, content, created_at) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&message.id)
    .bind(&message.sender_id)
    .bind(&message.receiver_id)
    .bind(&message.content)
    .bind(message.created_at.to_rfc3339())
    .execute(&state.db.pool)
    .await?;

    // Best-effort push to the recipient's live session; the row above is
    // the durable copy
    state
        .relay
        .publish(
            &message.receiver_id,
            RelayEvent::NewMessage {
                message: message.clone(),
            },
        )
        .await;

    Ok(Json(message))
}
