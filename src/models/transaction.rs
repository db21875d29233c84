// models/transaction.rs
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::waste_category::WasteType;

/// Largest value a `NUMERIC(8, 2)` weight column holds.
pub const MAX_WEIGHT: Decimal = Decimal::from_parts(99_999_999, 0, 0, false, 2);
/// Largest value a `NUMERIC(12, 2)` money column holds.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Cart,
    Pending,
    Verified,
    Rejected,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Cart => "cart",
            TransactionStatus::Pending => "pending",
            TransactionStatus::Verified => "verified",
            TransactionStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionStatus::Verified | TransactionStatus::Rejected)
    }
}

/// One pickup request. Totals are derived from the detail rows.
#[derive(Debug, Clone, FromRow)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    pub pickup_location: Option<String>,
    pub total_weight: Decimal,
    pub total_price: Decimal,
    pub status: TransactionStatus,
    pub image_path: Option<String>,
    pub verification_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub awaiting_approval: bool,
    pub verified_by: Option<i64>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Detail row joined with its category.
#[derive(Debug, Clone, FromRow)]
pub struct DetailRow {
    pub id: i64,
    pub transaction_id: i64,
    pub category_id: i64,
    pub estimated_weight: Decimal,
    pub actual_weight: Option<Decimal>,
    pub unit_price: Decimal,
    pub photo_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub category_name: String,
    pub category_type: WasteType,
    pub category_price_per_kg: Decimal,
}

impl DetailRow {
    /// Weight used for pricing: actual once recorded, estimated before.
    pub fn effective_weight(&self) -> Decimal {
        self.actual_weight.unwrap_or(self.estimated_weight)
    }

    pub fn line_price(&self) -> Decimal {
        (self.effective_weight() * self.unit_price).round_dp(2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Totals {
    pub weight: Decimal,
    pub price: Decimal,
}

impl Totals {
    pub fn zero() -> Self {
        Totals {
            weight: Decimal::ZERO,
            price: Decimal::ZERO,
        }
    }

    /// Sums `(weight, unit price)` pairs into transaction totals.
    /// `None` when a product or sum overflows or leaves the column range.
    pub fn from_lines<I>(lines: I) -> Option<Self>
    where
        I: IntoIterator<Item = (Decimal, Decimal)>,
    {
        let totals = lines
            .into_iter()
            .try_fold(Totals::zero(), |acc, (weight, unit_price)| {
                let line = weight.checked_mul(unit_price)?.round_dp(2);
                Some(Totals {
                    weight: acc.weight.checked_add(weight)?,
                    price: acc.price.checked_add(line)?,
                })
            })?;
        (totals.weight <= MAX_WEIGHT && totals.price <= MAX_AMOUNT).then_some(totals)
    }
}

#[derive(Debug, Serialize)]
pub struct CategorySummary {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub waste_type: WasteType,
    pub price_per_kg: Decimal,
}

#[derive(Debug, Serialize)]
pub struct DetailResponse {
    pub id: i64,
    pub transaction_id: i64,
    pub category_id: i64,
    pub estimated_weight: Decimal,
    pub actual_weight: Option<Decimal>,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
    pub photo_url: Option<String>,
    pub category: CategorySummary,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OwnerSummary {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone_number: String,
}

#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub id: i64,
    pub user_id: i64,
    pub pickup_location: Option<String>,
    pub total_weight: Decimal,
    pub total_price: Decimal,
    pub status: TransactionStatus,
    pub image_url: Option<String>,
    pub verification_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub needs_admin_approval: bool,
    pub verified_by: Option<i64>,
    pub rejection_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<OwnerSummary>,
    pub details: Vec<DetailResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A transaction loaded together with its lines and, for staff views, its owner.
#[derive(Debug, Clone)]
pub struct TransactionRecord {
    pub transaction: Transaction,
    pub details: Vec<DetailRow>,
    pub owner: Option<OwnerSummary>,
}

impl TransactionRecord {
    pub fn into_response<F>(self, url_for: F) -> TransactionResponse
    where
        F: Fn(&str) -> String,
    {
        TransactionResponse::build(self.transaction, self.details, self.owner, url_for)
    }
}

impl TransactionResponse {
    /// `url_for` turns a stored relative path into a public URL.
    pub fn build<F>(
        tx: Transaction,
        details: Vec<DetailRow>,
        user: Option<OwnerSummary>,
        url_for: F,
    ) -> Self
    where
        F: Fn(&str) -> String,
    {
        let details = details
            .into_iter()
            .map(|d| DetailResponse {
                id: d.id,
                transaction_id: d.transaction_id,
                category_id: d.category_id,
                estimated_weight: d.estimated_weight,
                actual_weight: d.actual_weight,
                unit_price: d.unit_price,
                subtotal: d.line_price(),
                photo_url: d.photo_path.as_deref().map(&url_for),
                category: CategorySummary {
                    id: d.category_id,
                    name: d.category_name,
                    waste_type: d.category_type,
                    price_per_kg: d.category_price_per_kg,
                },
                created_at: d.created_at,
                updated_at: d.updated_at,
            })
            .collect();

        TransactionResponse {
            id: tx.id,
            user_id: tx.user_id,
            pickup_location: tx.pickup_location,
            total_weight: tx.total_weight,
            total_price: tx.total_price,
            status: tx.status,
            image_url: tx.image_path.as_deref().map(&url_for),
            verification_token: tx.verification_token,
            token_expires_at: tx.token_expires_at,
            needs_admin_approval: tx.status == TransactionStatus::Pending && tx.awaiting_approval,
            verified_by: tx.verified_by,
            rejection_reason: tx.rejection_reason,
            user,
            details,
            created_at: tx.created_at,
            updated_at: tx.updated_at,
        }
    }
}
