use axum::{
    extract::State,
    http::{Method, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde_json::{json, Value};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod database;
pub mod dtos;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use state::AppState;

pub fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .allow_credentials(false);

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_check))
        .route("/api/health", get(api_health_check))
        .nest("/api", routes::api_routes(app_state.clone()))
        .nest("/storage", routes::storage::routes())
        .fallback(not_found)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

async fn root_handler() -> &'static str {
    "♻️ Waste Bank API"
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn api_health_check(State(state): State<AppState>) -> Json<Value> {
    let db_status = if database::connection::ping(&state.db).await {
        "connected"
    } else {
        "disconnected"
    };

    Json(json!({
        "status": "healthy",
        "database": db_status,
        "redis": state.redis_enabled,
        "mail": state.config.mail_api_url.is_some(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "status": false, "message": "Route not found" })),
    )
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::str::FromStr;

    use bytes::Bytes;
    use rust_decimal::Decimal;
    use sqlx::PgPool;

    use crate::models::user::{User, UserRole};
    use crate::services::storage::{PhotoSource, StorageService};

    pub fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    pub async fn insert_user(pool: &PgPool, role: UserRole, balance: Decimal) -> User {
        let tag = uuid::Uuid::new_v4().simple().to_string();
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, phone_number, password_hash, role, balance)
            VALUES ($1, $2, $3, 'x', $4, $5)
            RETURNING *
            "#,
        )
        .bind(format!("{} {}", role.as_str(), &tag[..6]))
        .bind(format!("{}@example.test", tag))
        .bind(format!("08{}", &tag[..12]))
        .bind(role)
        .bind(balance)
        .fetch_one(pool)
        .await
        .unwrap()
    }

    pub async fn balance_of(pool: &PgPool, user_id: i64) -> Decimal {
        sqlx::query_scalar("SELECT balance FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    pub async fn history_total(pool: &PgPool, user_id: i64) -> (i64, Decimal) {
        sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(amount), 0) FROM balance_histories WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await
        .unwrap()
    }

    pub async fn category_id(pool: &PgPool, name: &str) -> i64 {
        sqlx::query_scalar("SELECT id FROM waste_categories WHERE name = $1")
            .bind(name)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    pub fn png() -> PhotoSource {
        PhotoSource::Upload(Bytes::from_static(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR"))
    }

    pub fn scratch_storage() -> StorageService {
        let root = std::env::temp_dir().join(format!("waste-bank-{}", uuid::Uuid::new_v4()));
        StorageService::new(root, "http://localhost/storage")
    }
}
