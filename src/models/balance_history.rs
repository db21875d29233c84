use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;

/// Append-only ledger entry. Never updated or deleted.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BalanceHistory {
    pub id: i64,
    pub user_id: i64,
    pub amount: Decimal,
    pub transaction_id: Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
