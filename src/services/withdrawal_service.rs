// services/withdrawal_service.rs
use chrono::{DateTime, Duration, Local, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::PgPool;

use crate::dtos::withdrawal_dtos::WithdrawalDecision;
use crate::errors::{AppError, Result};
use crate::models::withdrawal::{Withdrawal, WithdrawalStatus};
use crate::services::ledger;
use crate::services::otp_throttle::next_local_day;

/// Smallest amount that may be withdrawn, and the smallest balance allowed to ask.
pub const MIN_WITHDRAWAL: Decimal = Decimal::from_parts(50_000, 0, 0, false, 0);
pub const WITHDRAWAL_TTL_HOURS: i64 = 24;

/// `[start, end)` of the local calendar day containing `now`.
pub fn local_day_bounds(now: DateTime<Local>) -> (DateTime<Utc>, DateTime<Utc>) {
    let end = next_local_day(now);
    let start = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| midnight.and_local_timezone(Local).earliest())
        .map(|midnight| midnight.with_timezone(&Utc))
        .unwrap_or_else(|| end - Duration::hours(24));
    (start, end)
}

/// Checks a new request against the caller's locked balance.
pub fn check_request(
    balance: Decimal,
    amount: Decimal,
    has_pending_today: bool,
    now: DateTime<Local>,
) -> Result<()> {
    if amount < MIN_WITHDRAWAL {
        return Err(AppError::invalid_field(
            "amount",
            format!("The minimum withdrawal amount is {}", MIN_WITHDRAWAL),
        ));
    }
    if has_pending_today {
        return Err(AppError::conflict_with(
            "You already requested a withdrawal today. Please wait for admin confirmation or try again tomorrow.",
            json!({ "next_request_available": next_local_day(now) }),
        ));
    }
    if balance < MIN_WITHDRAWAL {
        return Err(AppError::conflict(format!(
            "A balance of at least {} is required to withdraw",
            MIN_WITHDRAWAL
        )));
    }
    if balance < amount {
        return Err(AppError::conflict_with(
            "Insufficient balance",
            json!({ "balance": balance }),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    /// Past its deadline: mark expired and refuse the requested change.
    Expire,
    Apply(WithdrawalDecision),
}

pub fn decide_status_change(
    withdrawal: &Withdrawal,
    now: DateTime<Utc>,
    decision: WithdrawalDecision,
) -> Result<StatusChange> {
    if withdrawal.is_stale(now) {
        return Ok(StatusChange::Expire);
    }
    if withdrawal.status != WithdrawalStatus::Pending {
        return Err(AppError::conflict(
            "This withdrawal request has already been processed",
        ));
    }
    Ok(StatusChange::Apply(decision))
}

pub async fn create(
    pool: &PgPool,
    user_id: i64,
    amount: Decimal,
    method: &str,
    virtual_account: &str,
) -> Result<Withdrawal> {
    let amount = amount.round_dp(2);
    let now = Local::now();
    let (day_start, day_end) = local_day_bounds(now);

    let mut tx = pool.begin().await?;

    // the user row lock serialises concurrent requests from the same user
    let balance = ledger::lock_balance(&mut tx, user_id).await?;

    let has_pending_today: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM withdrawals
            WHERE user_id = $1 AND status = 'pending' AND created_at >= $2 AND created_at < $3
        )
        "#,
    )
    .bind(user_id)
    .bind(day_start)
    .bind(day_end)
    .fetch_one(&mut *tx)
    .await?;

    check_request(balance, amount, has_pending_today, now)?;

    let withdrawal = sqlx::query_as::<_, Withdrawal>(
        r#"
        INSERT INTO withdrawals (user_id, amount, method, virtual_account, status, expires_at)
        VALUES ($1, $2, $3, $4, 'pending', $5)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(amount)
    .bind(method)
    .bind(virtual_account)
    .bind(Utc::now() + Duration::hours(WITHDRAWAL_TTL_HOURS))
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(withdrawal_id = withdrawal.id, user_id, amount = %amount, "withdrawal requested");
    Ok(withdrawal)
}

pub async fn list_for_user(pool: &PgPool, user_id: i64) -> Result<Vec<Withdrawal>> {
    let withdrawals = sqlx::query_as::<_, Withdrawal>(
        "SELECT * FROM withdrawals WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(withdrawals)
}

pub async fn find_for_user(pool: &PgPool, id: i64, user_id: i64) -> Result<Withdrawal> {
    sqlx::query_as::<_, Withdrawal>("SELECT * FROM withdrawals WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Withdrawal not found"))
}

/// Admin decision on a pending request. An expired request is marked as
/// such and the call fails; acceptance debits the balance.
pub async fn update_status(
    pool: &PgPool,
    id: i64,
    decision: WithdrawalDecision,
) -> Result<Withdrawal> {
    let mut tx = pool.begin().await?;

    let withdrawal = sqlx::query_as::<_, Withdrawal>("SELECT * FROM withdrawals WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("Withdrawal not found"))?;

    let decision = match decide_status_change(&withdrawal, Utc::now(), decision)? {
        StatusChange::Expire => {
            sqlx::query("UPDATE withdrawals SET status = 'expired', updated_at = NOW() WHERE id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            tracing::info!(withdrawal_id = id, "withdrawal expired before decision");
            return Err(AppError::conflict("This withdrawal request has expired"));
        }
        StatusChange::Apply(decision) => decision,
    };

    let status = match decision {
        WithdrawalDecision::Accepted => {
            let balance = ledger::lock_balance(&mut tx, withdrawal.user_id).await?;
            if balance < withdrawal.amount {
                return Err(AppError::conflict(
                    "The user's balance is insufficient for this withdrawal",
                ));
            }
            ledger::debit(&mut tx, withdrawal.user_id, withdrawal.amount).await?;
            WithdrawalStatus::Accepted
        }
        WithdrawalDecision::Rejected => WithdrawalStatus::Rejected,
    };

    let updated = sqlx::query_as::<_, Withdrawal>(
        "UPDATE withdrawals SET status = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
    )
    .bind(status)
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        withdrawal_id = id,
        user_id = updated.user_id,
        amount = %updated.amount,
        status = ?updated.status,
        "withdrawal status updated"
    );
    Ok(updated)
}

/// Expires every pending request past its deadline. Returns how many changed.
pub async fn sweep_expired(pool: &PgPool) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE withdrawals SET status = 'expired', updated_at = NOW()
        WHERE status = 'pending' AND expires_at < NOW()
        "#,
    )
    .execute(pool)
    .await?;

    let expired = result.rows_affected();
    tracing::info!(expired, "expired withdrawal sweep finished");
    Ok(expired)
}
