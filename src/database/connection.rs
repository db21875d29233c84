use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::config::AdminBootstrap;

pub async fn connect(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")?;

    tracing::info!("✅ Connected to database");
    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("failed to run migrations")?;
    tracing::info!("📂 Migrations applied");
    Ok(())
}

pub async fn ping(pool: &PgPool) -> bool {
    sqlx::query("SELECT 1").execute(pool).await.is_ok()
}

/// Creates the configured admin account if no user owns that email yet.
pub async fn bootstrap_admin(pool: &PgPool, admin: &AdminBootstrap) -> Result<()> {
    let password_hash =
        bcrypt::hash(&admin.password, bcrypt::DEFAULT_COST).context("failed to hash admin password")?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO users (name, email, phone_number, password_hash, role, email_verified)
        VALUES ('Administrator', $1, $2, $3, 'admin', TRUE)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(&admin.email)
    .bind(&admin.phone_number)
    .bind(password_hash)
    .execute(pool)
    .await
    .context("failed to create admin user")?;

    if inserted.rows_affected() > 0 {
        tracing::info!(email = %admin.email, "admin account created");
    }
    Ok(())
}
