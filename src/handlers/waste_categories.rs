use axum::{
    extract::{Path, State},
    response::Json,
};
use rust_decimal::Decimal;
use validator::Validate;

use crate::dtos::category_dtos::CategoryRequest;
use crate::dtos::AppJson;
use crate::errors::{AppError, Result};
use crate::models::response::ApiResponse;
use crate::models::waste_category::{WasteCategory, MAX_PRICE_PER_KG};
use crate::state::AppState;

fn validated(payload: &CategoryRequest) -> Result<()> {
    payload.validate()?;
    if payload.price_per_kg < Decimal::ZERO {
        return Err(AppError::invalid_field("price_per_kg", "Price per kg may not be negative"));
    }
    if payload.price_per_kg.round_dp(2) > MAX_PRICE_PER_KG {
        return Err(AppError::invalid_field(
            "price_per_kg",
            format!("Price per kg may not be greater than {}", MAX_PRICE_PER_KG),
        ));
    }
    Ok(())
}

pub async fn index(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<WasteCategory>>>> {
    let categories = sqlx::query_as::<_, WasteCategory>("SELECT * FROM waste_categories ORDER BY id")
        .fetch_all(&state.db)
        .await?;
    Ok(Json(ApiResponse::with_message("Waste categories retrieved", categories)))
}

pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<WasteCategory>>> {
    let category = sqlx::query_as::<_, WasteCategory>("SELECT * FROM waste_categories WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::not_found("Waste category not found"))?;
    Ok(Json(ApiResponse::ok(category)))
}

pub async fn store(
    State(state): State<AppState>,
    AppJson(payload): AppJson<CategoryRequest>,
) -> Result<Json<ApiResponse<WasteCategory>>> {
    validated(&payload)?;

    let category = sqlx::query_as::<_, WasteCategory>(
        "INSERT INTO waste_categories (name, type, price_per_kg) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(payload.name.trim())
    .bind(payload.waste_type)
    .bind(payload.price_per_kg.round_dp(2))
    .fetch_one(&state.db)
    .await?;

    tracing::info!(category_id = category.id, name = %category.name, "waste category created");
    Ok(Json(ApiResponse::with_message("Waste category created", category)))
}

/// Price changes reach open carts on their next mutation; submitted
/// transactions keep the price captured at submission.
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<CategoryRequest>,
) -> Result<Json<ApiResponse<WasteCategory>>> {
    validated(&payload)?;

    let category = sqlx::query_as::<_, WasteCategory>(
        r#"
        UPDATE waste_categories
        SET name = $1, type = $2, price_per_kg = $3, updated_at = NOW()
        WHERE id = $4
        RETURNING *
        "#,
    )
    .bind(payload.name.trim())
    .bind(payload.waste_type)
    .bind(payload.price_per_kg.round_dp(2))
    .bind(id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::not_found("Waste category not found"))?;

    tracing::info!(category_id = id, price_per_kg = %category.price_per_kg, "waste category updated");
    Ok(Json(ApiResponse::with_message("Waste category updated", category)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::waste_category::WasteType;
    use crate::test_support::d;

    fn request(price: &str) -> CategoryRequest {
        CategoryRequest {
            name: "Kaca".into(),
            waste_type: WasteType::Inorganic,
            price_per_kg: d(price),
        }
    }

    #[test]
    fn price_must_fit_the_column() {
        assert!(validated(&request("0")).is_ok());
        assert!(validated(&request("99999999.99")).is_ok());
        assert!(matches!(
            validated(&request("100000000")),
            Err(AppError::Validation { .. })
        ));
        assert!(matches!(validated(&request("-1")), Err(AppError::Validation { .. })));
    }
}
