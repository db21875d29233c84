use axum::{extract::State, response::Json, Extension};

use crate::errors::Result;
use crate::models::balance_history::BalanceHistory;
use crate::models::response::ApiResponse;
use crate::models::user::CurrentUser;
use crate::services::ledger;
use crate::state::AppState;

pub async fn index(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<BalanceHistory>>>> {
    let entries = ledger::history_for_user(&state.db, user.id).await?;
    Ok(Json(ApiResponse::ok(entries)))
}
