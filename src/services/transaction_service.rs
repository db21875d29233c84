// services/transaction_service.rs
use std::collections::HashMap;

use sqlx::{PgConnection, PgPool};

use crate::dtos::transaction_dtos::{ActualWeights, HistoryFilter};
use crate::errors::{AppError, Result};
use crate::models::transaction::{
    DetailRow, OwnerSummary, Transaction, TransactionRecord, TransactionStatus,
};
use crate::models::user::{User, UserRole};
use crate::services::ledger;
use crate::services::verification::{
    ensure_awaiting_approval, ensure_verifiable, plan_verification, AdminDecision,
    VerificationOutcome, WeightDifference,
};

const DETAIL_SELECT: &str = r#"
    SELECT d.id, d.transaction_id, d.category_id, d.estimated_weight, d.actual_weight,
           d.unit_price, d.photo_path, d.created_at, d.updated_at,
           c.name AS category_name, c.type AS category_type,
           c.price_per_kg AS category_price_per_kg
    FROM transaction_details d
    JOIN waste_categories c ON c.id = d.category_id
"#;

pub async fn load_details(conn: &mut PgConnection, transaction_id: i64) -> Result<Vec<DetailRow>> {
    let sql = format!("{} WHERE d.transaction_id = $1 ORDER BY d.id", DETAIL_SELECT);
    let details = sqlx::query_as::<_, DetailRow>(&sql)
        .bind(transaction_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(details)
}

async fn load_details_for(
    conn: &mut PgConnection,
    transaction_ids: &[i64],
) -> Result<HashMap<i64, Vec<DetailRow>>> {
    let sql = format!(
        "{} WHERE d.transaction_id = ANY($1) ORDER BY d.transaction_id, d.id",
        DETAIL_SELECT
    );
    let rows = sqlx::query_as::<_, DetailRow>(&sql)
        .bind(transaction_ids)
        .fetch_all(&mut *conn)
        .await?;

    let mut grouped: HashMap<i64, Vec<DetailRow>> = HashMap::new();
    for row in rows {
        grouped.entry(row.transaction_id).or_default().push(row);
    }
    Ok(grouped)
}

async fn owners_for(
    conn: &mut PgConnection,
    user_ids: &[i64],
) -> Result<HashMap<i64, OwnerSummary>> {
    let owners = sqlx::query_as::<_, OwnerSummary>(
        "SELECT id, name, email, phone_number FROM users WHERE id = ANY($1)",
    )
    .bind(user_ids)
    .fetch_all(&mut *conn)
    .await?;
    Ok(owners.into_iter().map(|o| (o.id, o)).collect())
}

/// Attaches lines (and owners when `with_owner`) to a batch of transactions.
async fn hydrate(
    conn: &mut PgConnection,
    transactions: Vec<Transaction>,
    with_owner: bool,
) -> Result<Vec<TransactionRecord>> {
    let ids: Vec<i64> = transactions.iter().map(|t| t.id).collect();
    let mut details = load_details_for(conn, &ids).await?;
    let mut owners = if with_owner {
        let user_ids: Vec<i64> = transactions.iter().map(|t| t.user_id).collect();
        owners_for(conn, &user_ids).await?
    } else {
        HashMap::new()
    };

    Ok(transactions
        .into_iter()
        .map(|transaction| TransactionRecord {
            details: details.remove(&transaction.id).unwrap_or_default(),
            owner: owners.get(&transaction.user_id).cloned(),
            transaction,
        })
        .collect())
}

pub async fn record(
    conn: &mut PgConnection,
    transaction: Transaction,
    with_owner: bool,
) -> Result<TransactionRecord> {
    let details = load_details(conn, transaction.id).await?;
    let owner = if with_owner {
        owners_for(conn, &[transaction.user_id])
            .await?
            .remove(&transaction.user_id)
    } else {
        None
    };
    Ok(TransactionRecord {
        transaction,
        details,
        owner,
    })
}

async fn lock(conn: &mut PgConnection, id: i64) -> Result<Transaction> {
    sqlx::query_as::<_, Transaction>(
        "SELECT * FROM transactions WHERE id = $1 AND status <> 'cart' FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::not_found("Transaction not found"))
}

/// The caller's submitted transactions, newest first.
pub async fn list_for_user(
    pool: &PgPool,
    user_id: i64,
    filter: Option<HistoryFilter>,
) -> Result<Vec<TransactionRecord>> {
    let clause = match filter {
        None => "status <> 'cart'",
        Some(HistoryFilter::Pending) => "status = 'pending'",
        Some(HistoryFilter::History) => "status IN ('verified', 'rejected')",
    };
    let sql = format!(
        "SELECT * FROM transactions WHERE user_id = $1 AND {} ORDER BY created_at DESC, id DESC",
        clause
    );

    let mut conn = pool.acquire().await?;
    let transactions = sqlx::query_as::<_, Transaction>(&sql)
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;
    hydrate(&mut conn, transactions, false).await
}

/// Pending transactions for collectors, optionally narrowed by owner name.
pub async fn list_pending(pool: &PgPool, owner_name: Option<&str>) -> Result<Vec<TransactionRecord>> {
    let mut conn = pool.acquire().await?;

    let transactions = match owner_name.map(str::trim).filter(|q| !q.is_empty()) {
        Some(query) => {
            sqlx::query_as::<_, Transaction>(
                r#"
                SELECT t.* FROM transactions t
                JOIN users u ON u.id = t.user_id
                WHERE t.status = 'pending' AND u.name ILIKE $1 ESCAPE '\'
                ORDER BY t.created_at DESC, t.id DESC
                "#,
            )
            .bind(like_pattern(query))
            .fetch_all(&mut *conn)
            .await?
        }
        None => {
            sqlx::query_as::<_, Transaction>(
                "SELECT * FROM transactions WHERE status = 'pending' ORDER BY created_at DESC, id DESC",
            )
            .fetch_all(&mut *conn)
            .await?
        }
    };

    hydrate(&mut conn, transactions, true).await
}

/// `%query%` with LIKE metacharacters escaped.
pub fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Owners see their own transactions; collectors and admins see all.
pub async fn show(pool: &PgPool, id: i64, viewer: &User) -> Result<TransactionRecord> {
    let mut conn = pool.acquire().await?;
    let transaction = sqlx::query_as::<_, Transaction>(
        "SELECT * FROM transactions WHERE id = $1 AND status <> 'cart'",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::not_found("Transaction not found"))?;

    let is_staff = viewer.has_role(&[UserRole::Collector, UserRole::Admin]);
    if !is_staff && transaction.user_id != viewer.id {
        return Err(AppError::not_found("Transaction not found"));
    }

    record(&mut conn, transaction, is_staff).await
}

#[derive(Debug)]
pub struct VerificationResult {
    pub record: TransactionRecord,
    pub differences: Vec<WeightDifference>,
    pub outcome: VerificationOutcome,
}

/// Records actual weights. Light loads are verified and credited at once;
/// heavy loads stay pending until an admin acts.
pub async fn verify(
    pool: &PgPool,
    id: i64,
    verifier: &User,
    weights: &ActualWeights,
) -> Result<VerificationResult> {
    let mut tx = pool.begin().await?;

    let transaction = lock(&mut tx, id).await?;
    ensure_verifiable(&transaction)?;
    let details = load_details(&mut tx, transaction.id).await?;
    let plan = plan_verification(&details, weights)?;

    for (detail_id, weight) in &plan.weights {
        sqlx::query(
            "UPDATE transaction_details SET actual_weight = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(weight)
        .bind(detail_id)
        .execute(&mut *tx)
        .await?;
    }

    let (status, awaiting_approval) = match plan.outcome {
        VerificationOutcome::Verified => (TransactionStatus::Verified, false),
        VerificationOutcome::AwaitingApproval => (TransactionStatus::Pending, true),
    };

    let updated = sqlx::query_as::<_, Transaction>(
        r#"
        UPDATE transactions
        SET total_weight = $1, total_price = $2, status = $3, awaiting_approval = $4,
            verified_by = $5, updated_at = NOW()
        WHERE id = $6
        RETURNING *
        "#,
    )
    .bind(plan.totals.weight)
    .bind(plan.totals.price)
    .bind(status)
    .bind(awaiting_approval)
    .bind(verifier.id)
    .bind(transaction.id)
    .fetch_one(&mut *tx)
    .await?;

    if plan.outcome == VerificationOutcome::Verified {
        ledger::lock_balance(&mut tx, updated.user_id).await?;
        ledger::credit(&mut tx, updated.user_id, updated.total_price, updated.id).await?;
    }

    let record = record(&mut tx, updated, true).await?;
    tx.commit().await?;

    tracing::info!(
        transaction_id = id,
        verifier_id = verifier.id,
        total_weight = %plan.totals.weight,
        total_price = %plan.totals.price,
        outcome = ?plan.outcome,
        "transaction verified"
    );

    Ok(VerificationResult {
        record,
        differences: plan.differences,
        outcome: plan.outcome,
    })
}

pub async fn admin_action(
    pool: &PgPool,
    id: i64,
    admin: &User,
    decision: AdminDecision,
) -> Result<TransactionRecord> {
    let mut tx = pool.begin().await?;

    let transaction = lock(&mut tx, id).await?;
    ensure_awaiting_approval(&transaction)?;

    let updated = match &decision {
        AdminDecision::Approve => {
            let updated = sqlx::query_as::<_, Transaction>(
                r#"
                UPDATE transactions
                SET status = 'verified', awaiting_approval = FALSE, verified_by = $1, updated_at = NOW()
                WHERE id = $2
                RETURNING *
                "#,
            )
            .bind(admin.id)
            .bind(transaction.id)
            .fetch_one(&mut *tx)
            .await?;

            ledger::lock_balance(&mut tx, updated.user_id).await?;
            ledger::credit(&mut tx, updated.user_id, updated.total_price, updated.id).await?;
            updated
        }
        AdminDecision::Reject { reason } => {
            sqlx::query_as::<_, Transaction>(
                r#"
                UPDATE transactions
                SET status = 'rejected', awaiting_approval = FALSE, verified_by = $1,
                    rejection_reason = $2, updated_at = NOW()
                WHERE id = $3
                RETURNING *
                "#,
            )
            .bind(admin.id)
            .bind(reason)
            .bind(transaction.id)
            .fetch_one(&mut *tx)
            .await?
        }
    };

    let record = record(&mut tx, updated, true).await?;
    tx.commit().await?;

    tracing::info!(transaction_id = id, admin_id = admin.id, decision = ?decision, "admin action applied");
    Ok(record)
}
