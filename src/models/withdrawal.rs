use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "withdrawal_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    Pending,
    Accepted,
    Rejected,
    Expired,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Withdrawal {
    pub id: i64,
    pub user_id: i64,
    pub amount: Decimal,
    pub method: String,
    pub virtual_account: String,
    pub status: WithdrawalStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Withdrawal {
    /// Still pending but past its deadline; the sweep would expire it.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.status == WithdrawalStatus::Pending && self.expires_at < now
    }
}
