use std::net::SocketAddr;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tutorlink_server::{
    build_router, config::Config, db::Database, services::relay::MessageRelay, AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tutorlink_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Strict configuration: a missing JWT_SECRET aborts startup
    let config = Config::from_env()?;

    // Initialize database
    let db = Database::connect(&config.database_url).await?;
    db.run_migrations().await?;

    let relay = MessageRelay::new();

    let state = AppState {
        db,
        config: config.clone(),
        relay,
    };

    let app = build_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("API running on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
