// services/ledger.rs
//! Balance mutations. Callers own the surrounding database transaction and
//! must already hold the user's row lock.

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use crate::errors::{AppError, Result};
use crate::models::balance_history::BalanceHistory;

/// Locks the user row and returns the current balance.
pub async fn lock_balance(conn: &mut PgConnection, user_id: i64) -> Result<Decimal> {
    let balance: Option<Decimal> =
        sqlx::query_scalar("SELECT balance FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *conn)
            .await?;
    balance.ok_or_else(|| AppError::not_found("User not found"))
}

/// Adds `amount` to the balance and appends the matching history row.
/// The unique index on `balance_histories.transaction_id` turns a second
/// credit for the same transaction into an error.
pub async fn credit(
    conn: &mut PgConnection,
    user_id: i64,
    amount: Decimal,
    transaction_id: i64,
) -> Result<BalanceHistory> {
    sqlx::query("UPDATE users SET balance = balance + $1, updated_at = NOW() WHERE id = $2")
        .bind(amount)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    let entry = sqlx::query_as::<_, BalanceHistory>(
        r#"
        INSERT INTO balance_histories (user_id, amount, transaction_id, timestamp)
        VALUES ($1, $2, $3, NOW())
        RETURNING id, user_id, amount, transaction_id, timestamp, created_at
        "#,
    )
    .bind(user_id)
    .bind(amount)
    .bind(transaction_id)
    .fetch_one(&mut *conn)
    .await?;

    tracing::info!(user_id, transaction_id, amount = %amount, "balance credited");
    Ok(entry)
}

/// Subtracts `amount`, refusing to go below zero.
pub async fn debit(conn: &mut PgConnection, user_id: i64, amount: Decimal) -> Result<Decimal> {
    let balance: Option<Decimal> = sqlx::query_scalar(
        r#"
        UPDATE users SET balance = balance - $1, updated_at = NOW()
        WHERE id = $2 AND balance >= $1
        RETURNING balance
        "#,
    )
    .bind(amount)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    let balance = balance.ok_or_else(|| AppError::conflict("Insufficient balance"))?;
    tracing::info!(user_id, amount = %amount, balance = %balance, "balance debited");
    Ok(balance)
}

pub async fn history_for_user(pool: &PgPool, user_id: i64) -> Result<Vec<BalanceHistory>> {
    let entries = sqlx::query_as::<_, BalanceHistory>(
        r#"
        SELECT id, user_id, amount, transaction_id, timestamp, created_at
        FROM balance_histories
        WHERE user_id = $1
        ORDER BY timestamp DESC, id DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(entries)
}
