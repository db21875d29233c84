use axum::{extract::State, response::Json, Extension};
use serde_json::Value;
use validator::Validate;

use crate::dtos::otp_dtos::VerifyOtpRequest;
use crate::dtos::AppJson;
use crate::errors::Result;
use crate::models::otp::OtpIssued;
use crate::models::response::ApiResponse;
use crate::models::user::CurrentUser;
use crate::state::AppState;

pub async fn send(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<OtpIssued>>> {
    let issued = state.otp_service.send(&user).await?;
    let message = if issued.already_sent {
        "An OTP was already sent and is still valid"
    } else {
        "OTP sent to your email"
    };
    Ok(Json(ApiResponse::with_message(message, issued)))
}

pub async fn verify(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    AppJson(payload): AppJson<VerifyOtpRequest>,
) -> Result<Json<ApiResponse<Value>>> {
    payload.validate()?;
    state.otp_service.verify(&user, payload.otp.trim()).await?;
    Ok(Json(ApiResponse::message("Email verified successfully")))
}

pub async fn resend(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<OtpIssued>>> {
    let issued = state.otp_service.resend(&user).await?;
    Ok(Json(ApiResponse::with_message("OTP resent to your email", issued)))
}
