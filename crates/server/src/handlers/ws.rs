// WebSocket endpoint for live message delivery
// One connection per logged-in user, subscribed to its own topic

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::Deserialize;
use tokio::sync::broadcast;

use crate::{
    error::{AppError, Result},
    routes::auth::Claims,
    services::relay::MessageRelay,
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Result<Response> {
    // The token is checked before the upgrade; an anonymous socket never opens
    let token = query.token.ok_or(AppError::Unauthorized)?;
    let token_data = decode::<Claims>(
        &token,
        &DecodingKey::from_secret(state.config.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::Unauthorized)?;

    let user_id = token_data.claims.sub;
    let relay = state.relay.clone();

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, user_id, relay)))
}

async fn handle_socket(socket: WebSocket, user_id: String, relay: MessageRelay) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = relay.subscribe(&user_id).await;

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        let Ok(text) = serde_json::to_string(&event) else {
                            continue;
                        };
                        if sender.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    // Clients write through the HTTP API, not the socket
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    drop(events);
    relay.disconnect(&user_id).await;
}
