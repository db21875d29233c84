use rust_decimal::Decimal;
use serde::Deserialize;
use validator::Validate;

use crate::models::waste_category::WasteType;

#[derive(Debug, Deserialize, Validate)]
pub struct CategoryRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1 to 255 characters"))]
    pub name: String,

    #[serde(rename = "type")]
    pub waste_type: WasteType,

    pub price_per_kg: Decimal,
}
