use axum::{
    extract::{Path, State},
    response::Json,
    Extension,
};
use serde_json::{json, Value};
use validator::Validate;

use crate::dtos::withdrawal_dtos::{CreateWithdrawalRequest, UpdateWithdrawalStatusRequest};
use crate::dtos::AppJson;
use crate::errors::Result;
use crate::models::response::ApiResponse;
use crate::models::user::CurrentUser;
use crate::models::withdrawal::Withdrawal;
use crate::services::withdrawal_service;
use crate::state::AppState;

pub async fn store(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    AppJson(payload): AppJson<CreateWithdrawalRequest>,
) -> Result<Json<ApiResponse<Withdrawal>>> {
    payload.validate()?;

    let withdrawal = withdrawal_service::create(
        &state.db,
        user.id,
        payload.amount,
        payload.method.trim(),
        payload.virtual_account.trim(),
    )
    .await?;

    Ok(Json(ApiResponse::with_message(
        "Withdrawal request submitted. It will expire in 24 hours if not processed",
        withdrawal,
    )))
}

pub async fn index(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<Withdrawal>>>> {
    let withdrawals = withdrawal_service::list_for_user(&state.db, user.id).await?;
    Ok(Json(ApiResponse::ok(withdrawals)))
}

pub async fn show(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Withdrawal>>> {
    let withdrawal = withdrawal_service::find_for_user(&state.db, id, user.id).await?;
    Ok(Json(ApiResponse::ok(withdrawal)))
}

pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<UpdateWithdrawalStatusRequest>,
) -> Result<Json<ApiResponse<Withdrawal>>> {
    let withdrawal = withdrawal_service::update_status(&state.db, id, payload.status).await?;
    Ok(Json(ApiResponse::with_message(
        "Withdrawal status updated",
        withdrawal,
    )))
}

pub async fn check_expired(State(state): State<AppState>) -> Result<Json<ApiResponse<Value>>> {
    let expired = withdrawal_service::sweep_expired(&state.db).await?;
    Ok(Json(ApiResponse::with_message(
        format!("{} withdrawal request(s) expired", expired),
        json!({ "expired_count": expired }),
    )))
}
