use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::errors::{AppError, Result};
use crate::models::user::{Claims, CurrentUser, User, UserRole};
use crate::state::AppState;

pub fn issue_token(user: &User, secret: &str, ttl_hours: i64) -> Result<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: user.id.to_string(),
        role: user.role,
        ver: user.token_version,
        iat: now.timestamp() as usize,
        exp: (now + Duration::hours(ttl_hours)).timestamp() as usize,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::internal(format!("token generation failed: {}", e)))
}

pub fn decode_token(token: &str, secret: &str) -> Result<Claims> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )?;
    Ok(data.claims)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Resolves the bearer token to a live user and stores it as `CurrentUser`.
pub async fn auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let token = bearer_token(&headers).ok_or(AppError::Unauthenticated)?;
    let claims = decode_token(token, &state.config.jwt_secret)?;
    let user_id: i64 = claims.sub.parse().map_err(|_| AppError::Unauthenticated)?;

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(AppError::Unauthenticated)?;

    // logout bumps token_version, invalidating older tokens
    if user.token_version != claims.ver {
        return Err(AppError::Unauthenticated);
    }

    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}

fn ensure_role(request: &Request, allowed: &[UserRole]) -> Result<()> {
    let user = request
        .extensions()
        .get::<CurrentUser>()
        .ok_or(AppError::Unauthenticated)?;
    if !user.has_role(allowed) {
        return Err(AppError::forbidden("You are not allowed to perform this action"));
    }
    Ok(())
}

pub async fn require_admin(request: Request, next: Next) -> Result<Response> {
    ensure_role(&request, &[UserRole::Admin])?;
    Ok(next.run(request).await)
}

pub async fn require_collector_or_admin(request: Request, next: Next) -> Result<Response> {
    ensure_role(&request, &[UserRole::Collector, UserRole::Admin])?;
    Ok(next.run(request).await)
}
