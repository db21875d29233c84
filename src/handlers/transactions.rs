use axum::{
    extract::{Path, Query, State},
    response::Json,
    Extension,
};
use serde::Serialize;
use validator::Validate;

use crate::dtos::transaction_dtos::{AdminActionRequest, SearchQuery, TransactionListQuery, VerifyRequest};
use crate::dtos::AppJson;
use crate::errors::Result;
use crate::models::response::ApiResponse;
use crate::models::transaction::{TransactionRecord, TransactionResponse};
use crate::models::user::{CurrentUser, UserRole};
use crate::services::transaction_service;
use crate::services::verification::{admin_decision, VerificationOutcome, WeightDifference};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct Verifier {
    pub id: i64,
    pub name: String,
    pub role: UserRole,
}

#[derive(Debug, Serialize)]
pub struct VerificationResponse {
    pub transaction: TransactionResponse,
    pub weight_differences: Vec<WeightDifference>,
    pub needs_admin_approval: bool,
    pub verifier: Verifier,
}

fn respond_all(state: &AppState, records: Vec<TransactionRecord>) -> Vec<TransactionResponse> {
    records
        .into_iter()
        .map(|r| r.into_response(|p| state.storage.url_for(p)))
        .collect()
}

pub async fn index(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<TransactionListQuery>,
) -> Result<Json<ApiResponse<Vec<TransactionResponse>>>> {
    let records = transaction_service::list_for_user(&state.db, user.id, query.status).await?;
    Ok(Json(ApiResponse::ok(respond_all(&state, records))))
}

pub async fn pending(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<TransactionResponse>>>> {
    let records = transaction_service::list_pending(&state.db, None).await?;
    Ok(Json(ApiResponse::ok(respond_all(&state, records))))
}

pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<ApiResponse<Vec<TransactionResponse>>>> {
    let records = transaction_service::list_pending(&state.db, Some(&query.query)).await?;
    Ok(Json(ApiResponse::ok(respond_all(&state, records))))
}

pub async fn show(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<TransactionResponse>>> {
    let record = transaction_service::show(&state.db, id, &user).await?;
    Ok(Json(ApiResponse::ok(record.into_response(|p| state.storage.url_for(p)))))
}

pub async fn verify(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<VerifyRequest>,
) -> Result<Json<ApiResponse<VerificationResponse>>> {
    let result = transaction_service::verify(&state.db, id, &user, &payload.actual_weights).await?;

    let needs_admin_approval = result.outcome == VerificationOutcome::AwaitingApproval;
    let message = if needs_admin_approval {
        "Weights recorded. This transaction needs admin approval"
    } else {
        "Verification successful and balance has been credited"
    };

    Ok(Json(ApiResponse::with_message(
        message,
        VerificationResponse {
            transaction: result.record.into_response(|p| state.storage.url_for(p)),
            weight_differences: result.differences,
            needs_admin_approval,
            verifier: Verifier {
                id: user.id,
                name: user.name.clone(),
                role: user.role,
            },
        },
    )))
}

pub async fn admin_action(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<AdminActionRequest>,
) -> Result<Json<ApiResponse<TransactionResponse>>> {
    payload.validate()?;
    let decision = admin_decision(&payload)?;

    let record = transaction_service::admin_action(&state.db, id, &user, decision).await?;
    let message = format!("Transaction {}", record.transaction.status.as_str());
    Ok(Json(ApiResponse::with_message(
        message,
        record.into_response(|p| state.storage.url_for(p)),
    )))
}
