use std::net::SocketAddr;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use booking_gallery::{app, config::Config, repositories::sessions, state::AppState};

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!("✅ Configuration loaded successfully");
    if !config.production {
        tracing::warn!("⚠️ APP_ENV is not production; default credentials may be in use");
    }

    let state = AppState::new(&config).await?;
    tracing::info!("✅ AppState initialized");

    sessions::spawn_sweeper(state.sessions.clone(), SESSION_SWEEP_INTERVAL);
    tracing::info!("✅ Background session sweep started (runs every hour)");

    let app = app::router(state);

    let addr = config.bind_addr;
    tracing::info!("🚀 Server listening on http://{}", addr);
    tracing::info!("✅ All systems operational");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
