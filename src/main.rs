use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use waste_bank_api::config::AppConfig;
use waste_bank_api::database::connection;
use waste_bank_api::services::otp_throttle::{MemoryOtpThrottle, OtpThrottle, RedisOtpThrottle};
use waste_bank_api::state::AppState;
use waste_bank_api::build_router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=info")),
        )
        .init();

    let db = connection::connect(&config.database_url).await?;
    connection::run_migrations(&db).await?;
    if let Some(admin) = &config.admin {
        connection::bootstrap_admin(&db, admin).await?;
    }

    let app_state = initialize_app_state(db, config).await;
    app_state
        .storage
        .ensure_dirs()
        .await
        .context("failed to create upload directories")?;

    let addr: SocketAddr = format!("{}:{}", app_state.config.host, app_state.config.port)
        .parse()
        .context("HOST/PORT do not form a valid socket address")?;

    let app = build_router(app_state);
    start_server(app, addr).await
}

async fn initialize_app_state(db: sqlx::PgPool, config: AppConfig) -> AppState {
    let redis = match config.redis_url.as_deref() {
        Some(url) => match RedisOtpThrottle::connect(url).await {
            Ok(throttle) => {
                tracing::info!("✅ Redis OTP throttle connected");
                Some(throttle)
            }
            Err(e) => {
                tracing::error!("❌ Failed to connect to Redis: {}", e);
                tracing::warn!("Falling back to in-process OTP throttle");
                None
            }
        },
        None => {
            tracing::warn!("REDIS_URL not set, using in-process OTP throttle");
            None
        }
    };

    match redis {
        Some(throttle) => AppState::new(db, config, Arc::new(throttle) as Arc<dyn OtpThrottle>).with_redis(),
        None => AppState::new(db, config, Arc::new(MemoryOtpThrottle::new())),
    }
}

async fn start_server(app: axum::Router, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;

    tracing::info!("🚀 Server starting on {}", addr);
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
