use axum::{extract::State, response::Json, Extension};
use bcrypt::{hash, verify, DEFAULT_COST};
use serde_json::Value;
use validator::Validate;

use crate::dtos::auth_dtos::{LoginRequest, RegisterRequest};
use crate::dtos::AppJson;
use crate::errors::{AppError, Result};
use crate::middleware::auth::issue_token;
use crate::models::response::ApiResponse;
use crate::models::user::{AuthResponse, CurrentUser, User, UserResponse};
use crate::state::AppState;

/// Maps a unique-constraint violation on `users` to a field error.
pub(crate) fn duplicate_user_field(err: sqlx::Error) -> AppError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.code().as_deref() == Some("23505") {
            let constraint = db_err.constraint().unwrap_or_default();
            return if constraint.contains("phone") {
                AppError::invalid_field("phone_number", "The phone number has already been taken")
            } else {
                AppError::invalid_field("email", "The email has already been taken")
            };
        }
    }
    AppError::Database(err)
}

fn auth_response(state: &AppState, user: &User) -> Result<AuthResponse> {
    let token = issue_token(user, &state.config.jwt_secret, state.config.jwt_ttl_hours)?;
    Ok(AuthResponse {
        user: UserResponse::build(user, |p| state.storage.url_for(p)),
        token,
        token_type: "Bearer",
    })
}

pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<Json<ApiResponse<AuthResponse>>> {
    payload.validate()?;

    let email = payload.email.trim().to_lowercase();
    let password_hash = hash(&payload.password, DEFAULT_COST)?;

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (name, email, phone_number, password_hash, role)
        VALUES ($1, $2, $3, $4, 'user')
        RETURNING *
        "#,
    )
    .bind(payload.name.trim())
    .bind(&email)
    .bind(payload.phone_number.trim())
    .bind(password_hash)
    .fetch_one(&state.db)
    .await
    .map_err(duplicate_user_field)?;

    tracing::info!(user_id = user.id, "user registered");
    Ok(Json(ApiResponse::with_message(
        "Registration successful",
        auth_response(&state, &user)?,
    )))
}

pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Json<ApiResponse<AuthResponse>>> {
    payload.validate()?;

    let login = payload.login.trim();
    let user = sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE email = LOWER($1) OR phone_number = $1",
    )
    .bind(login)
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::InvalidCredentials)?;

    if !verify(&payload.password, &user.password_hash)? {
        return Err(AppError::InvalidCredentials);
    }

    tracing::info!(user_id = user.id, "user logged in");
    Ok(Json(ApiResponse::with_message(
        "Login successful",
        auth_response(&state, &user)?,
    )))
}

/// Invalidates every token issued to the caller so far.
pub async fn logout(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Value>>> {
    sqlx::query("UPDATE users SET token_version = token_version + 1, updated_at = NOW() WHERE id = $1")
        .bind(user.id)
        .execute(&state.db)
        .await?;

    tracing::info!(user_id = user.id, "user logged out");
    Ok(Json(ApiResponse::message("Logout successful")))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Json<ApiResponse<UserResponse>> {
    Json(ApiResponse::ok(UserResponse::build(&user, |p| {
        state.storage.url_for(p)
    })))
}
