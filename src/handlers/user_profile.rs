use axum::{extract::State, response::Json, Extension};
use validator::Validate;

use crate::dtos::profile_dtos::UpdateProfileRequest;
use crate::dtos::AppJson;
use crate::errors::Result;
use crate::handlers::auth::duplicate_user_field;
use crate::models::response::ApiResponse;
use crate::models::user::{CurrentUser, User, UserResponse};
use crate::services::storage::{PhotoSource, StorageService, AVATAR_DIR};
use crate::state::AppState;

pub async fn show(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Json<ApiResponse<UserResponse>> {
    Json(ApiResponse::ok(UserResponse::build(&user, |p| {
        state.storage.url_for(p)
    })))
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string())
}

/// Partial update; a changed email must be verified again.
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    AppJson(payload): AppJson<UpdateProfileRequest>,
) -> Result<Json<ApiResponse<UserResponse>>> {
    payload.validate()?;

    let avatar = match payload.avatar.as_deref().map(str::trim) {
        Some(encoded) if !encoded.is_empty() => {
            let image = StorageService::decode(PhotoSource::Base64(encoded.to_string()))?;
            Some(state.storage.save_image(AVATAR_DIR, &image).await?)
        }
        _ => None,
    };

    let updated = match apply_update(&state, user.id, payload, avatar.as_deref()).await {
        Ok(updated) => updated,
        Err(e) => {
            if let Some(path) = &avatar {
                state.storage.delete(path).await;
            }
            return Err(e);
        }
    };

    if avatar.is_some() {
        if let Some(old) = user.avatar_path.as_deref() {
            state.storage.delete(old).await;
        }
    }

    tracing::info!(user_id = user.id, "profile updated");
    Ok(Json(ApiResponse::with_message(
        "Profile updated",
        UserResponse::build(&updated, |p| state.storage.url_for(p)),
    )))
}

async fn apply_update(
    state: &AppState,
    user_id: i64,
    payload: UpdateProfileRequest,
    avatar: Option<&str>,
) -> Result<User> {
    let email = payload.email.map(|e| e.trim().to_lowercase());

    let user = sqlx::query_as::<_, User>(
        r#"
        UPDATE users SET
            name = COALESCE($2, name),
            email_verified = CASE WHEN $3::TEXT IS NOT NULL AND $3 <> email THEN FALSE ELSE email_verified END,
            otp_code = CASE WHEN $3::TEXT IS NOT NULL AND $3 <> email THEN NULL ELSE otp_code END,
            otp_expires_at = CASE WHEN $3::TEXT IS NOT NULL AND $3 <> email THEN NULL ELSE otp_expires_at END,
            email = COALESCE($3, email),
            phone_number = COALESCE($4, phone_number),
            address = COALESCE($5, address),
            avatar_path = COALESCE($6, avatar_path),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(trimmed(payload.name))
    .bind(email)
    .bind(trimmed(payload.phone_number))
    .bind(trimmed(payload.address))
    .bind(avatar)
    .fetch_one(&state.db)
    .await
    .map_err(duplicate_user_field)?;

    Ok(user)
}
