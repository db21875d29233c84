use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub category_id: i64,
    pub estimated_weight: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemRequest {
    pub detail_id: i64,
    pub estimated_weight: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveItemRequest {
    pub detail_id: i64,
}

/// JSON form of cart submission; the photo is base64, optionally as a `data:` URL.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitCartJson {
    pub pickup_location: Option<String>,
    pub photo: Option<String>,
}
