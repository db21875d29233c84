use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Largest value the `NUMERIC(10, 2)` price column holds.
pub const MAX_PRICE_PER_KG: Decimal = Decimal::from_parts(1_410_065_407, 2, 0, false, 2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "waste_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum WasteType {
    Organic,
    Inorganic,
    Hazardous,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct WasteCategory {
    pub id: i64,
    pub name: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub waste_type: WasteType,
    pub price_per_kg: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
