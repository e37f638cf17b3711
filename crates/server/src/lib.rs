pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;

use axum::{http::HeaderValue, middleware as axum_middleware, routing::get, Json, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::services::relay::MessageRelay;

#[derive(Clone)]
pub struct AppState {
    pub db: db::Database,
    pub config: config::Config,
    pub relay: MessageRelay,
}

pub fn build_router(state: AppState) -> Router {
    // Everything in this group sits behind the bearer-token gate
    let protected_routes = Router::new()
        .nest("/profile", routes::profile::router())
        .nest("/bookings", routes::bookings::router())
        .nest("/reviews", routes::reviews::router())
        .nest("/messages", routes::messages::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    let cors = match state.config.cors_origin.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(Any)
            .allow_headers(Any),
        // Unparseable origin config falls back to same-origin only
        Err(_) => CorsLayer::new().allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(health_check))
        .route("/ws", get(handlers::ws::ws_handler))
        .nest("/auth", routes::auth::router())
        .nest("/tutors", routes::tutors::router())
        .merge(protected_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}
