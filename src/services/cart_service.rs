// services/cart_service.rs
use chrono::{Duration, Utc};
use rand::{distributions::Alphanumeric, Rng};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use crate::errors::{AppError, Result};
use crate::models::transaction::{Totals, Transaction, TransactionRecord, MAX_WEIGHT};
use crate::services::storage::{PhotoSource, StorageService, PHOTO_DIR};
use crate::services::transaction_service::{load_details, record};

const VERIFICATION_TOKEN_LEN: usize = 32;
const VERIFICATION_TOKEN_TTL_HOURS: i64 = 24;

pub fn verification_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(VERIFICATION_TOKEN_LEN)
        .map(char::from)
        .collect()
}

fn weight_too_large() -> AppError {
    AppError::invalid_field(
        "estimatedWeight",
        format!("Weight may not be greater than {}", MAX_WEIGHT),
    )
}

/// Rounds to the stored precision and requires a weight in `(0, MAX_WEIGHT]`.
pub fn positive_weight(weight: Decimal) -> Result<Decimal> {
    let weight = weight.round_dp(2);
    if weight <= Decimal::ZERO {
        return Err(AppError::invalid_field(
            "estimatedWeight",
            "Weight must be greater than 0",
        ));
    }
    if weight > MAX_WEIGHT {
        return Err(weight_too_large());
    }
    Ok(weight)
}

async fn lock_cart(conn: &mut PgConnection, user_id: i64) -> Result<Option<Transaction>> {
    let cart = sqlx::query_as::<_, Transaction>(
        "SELECT * FROM transactions WHERE user_id = $1 AND status = 'cart' FOR UPDATE",
    )
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(cart)
}

/// Returns the user's cart, creating it if needed. The partial unique index
/// keeps concurrent callers on the same row.
async fn lock_or_create_cart(conn: &mut PgConnection, user_id: i64) -> Result<Transaction> {
    sqlx::query(
        r#"
        INSERT INTO transactions (user_id, status)
        VALUES ($1, 'cart')
        ON CONFLICT (user_id) WHERE status = 'cart' DO NOTHING
        "#,
    )
    .bind(user_id)
    .execute(&mut *conn)
    .await?;

    lock_cart(conn, user_id)
        .await?
        .ok_or_else(|| AppError::internal("cart row missing after upsert"))
}

/// Re-prices every line at the current category price and stores new totals.
async fn refresh_totals(conn: &mut PgConnection, cart_id: i64) -> Result<Transaction> {
    sqlx::query(
        r#"
        UPDATE transaction_details d
        SET unit_price = c.price_per_kg, updated_at = NOW()
        FROM waste_categories c
        WHERE c.id = d.category_id AND d.transaction_id = $1 AND d.unit_price <> c.price_per_kg
        "#,
    )
    .bind(cart_id)
    .execute(&mut *conn)
    .await?;

    let details = load_details(conn, cart_id).await?;
    let totals = Totals::from_lines(details.iter().map(|d| (d.estimated_weight, d.unit_price)))
        .ok_or_else(|| {
            AppError::invalid_field("estimatedWeight", "Cart total weight or price is too large")
        })?;

    let cart = sqlx::query_as::<_, Transaction>(
        r#"
        UPDATE transactions SET total_weight = $1, total_price = $2, updated_at = NOW()
        WHERE id = $3
        RETURNING *
        "#,
    )
    .bind(totals.weight)
    .bind(totals.price)
    .bind(cart_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(cart)
}

pub async fn current(pool: &PgPool, user_id: i64) -> Result<Option<TransactionRecord>> {
    let mut conn = pool.acquire().await?;
    let cart = sqlx::query_as::<_, Transaction>(
        "SELECT * FROM transactions WHERE user_id = $1 AND status = 'cart'",
    )
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    match cart {
        Some(cart) => Ok(Some(record(&mut conn, cart, false).await?)),
        None => Ok(None),
    }
}

/// Adds weight for a category; a second add for the same category
/// accumulates into the existing line.
pub async fn add_item(
    pool: &PgPool,
    user_id: i64,
    category_id: i64,
    weight: Decimal,
) -> Result<TransactionRecord> {
    let weight = positive_weight(weight)?;
    let mut tx = pool.begin().await?;

    let price: Decimal = sqlx::query_scalar("SELECT price_per_kg FROM waste_categories WHERE id = $1")
        .bind(category_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::invalid_field("categoryId", "The selected category is invalid"))?;

    let cart = lock_or_create_cart(&mut tx, user_id).await?;

    let existing: Option<Decimal> = sqlx::query_scalar(
        "SELECT estimated_weight FROM transaction_details WHERE transaction_id = $1 AND category_id = $2",
    )
    .bind(cart.id)
    .bind(category_id)
    .fetch_optional(&mut *tx)
    .await?;
    if let Some(existing) = existing {
        if existing + weight > MAX_WEIGHT {
            return Err(weight_too_large());
        }
    }

    sqlx::query(
        r#"
        INSERT INTO transaction_details (transaction_id, category_id, estimated_weight, unit_price)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (transaction_id, category_id) DO UPDATE
        SET estimated_weight = transaction_details.estimated_weight + EXCLUDED.estimated_weight,
            unit_price = EXCLUDED.unit_price,
            updated_at = NOW()
        "#,
    )
    .bind(cart.id)
    .bind(category_id)
    .bind(weight)
    .bind(price)
    .execute(&mut *tx)
    .await?;

    let cart = refresh_totals(&mut tx, cart.id).await?;
    let record = record(&mut tx, cart, false).await?;
    tx.commit().await?;

    tracing::debug!(user_id, category_id, weight = %weight, "cart item added");
    Ok(record)
}

pub async fn update_item(
    pool: &PgPool,
    user_id: i64,
    detail_id: i64,
    weight: Decimal,
) -> Result<TransactionRecord> {
    let weight = positive_weight(weight)?;
    let mut tx = pool.begin().await?;

    let cart = lock_cart(&mut tx, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Cart not found"))?;

    let updated = sqlx::query(
        r#"
        UPDATE transaction_details SET estimated_weight = $1, updated_at = NOW()
        WHERE id = $2 AND transaction_id = $3
        "#,
    )
    .bind(weight)
    .bind(detail_id)
    .bind(cart.id)
    .execute(&mut *tx)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(AppError::not_found("Item not found in cart"));
    }

    let cart = refresh_totals(&mut tx, cart.id).await?;
    let record = record(&mut tx, cart, false).await?;
    tx.commit().await?;
    Ok(record)
}

/// Removes a line. Removing the last line deletes the cart and yields `None`.
pub async fn remove_item(
    pool: &PgPool,
    user_id: i64,
    detail_id: i64,
) -> Result<Option<TransactionRecord>> {
    let mut tx = pool.begin().await?;

    let cart = lock_cart(&mut tx, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Cart not found"))?;

    let deleted = sqlx::query("DELETE FROM transaction_details WHERE id = $1 AND transaction_id = $2")
        .bind(detail_id)
        .bind(cart.id)
        .execute(&mut *tx)
        .await?;

    if deleted.rows_affected() == 0 {
        return Err(AppError::not_found("Item not found in cart"));
    }

    let remaining: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM transaction_details WHERE transaction_id = $1")
            .bind(cart.id)
            .fetch_one(&mut *tx)
            .await?;

    let result = if remaining == 0 {
        sqlx::query("DELETE FROM transactions WHERE id = $1")
            .bind(cart.id)
            .execute(&mut *tx)
            .await?;
        None
    } else {
        let cart = refresh_totals(&mut tx, cart.id).await?;
        Some(record(&mut tx, cart, false).await?)
    };

    tx.commit().await?;
    Ok(result)
}

/// Moves the cart to `pending` with a photo, freezing line prices.
/// The stored photo is removed again if the database work fails.
pub async fn submit(
    pool: &PgPool,
    storage: &StorageService,
    user_id: i64,
    pickup_location: Option<String>,
    photo: Option<PhotoSource>,
) -> Result<TransactionRecord> {
    let pickup_location = pickup_location
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .ok_or_else(|| {
            AppError::invalid_field("pickupLocation", "The pickup location field is required")
        })?;
    let photo = photo.ok_or_else(|| AppError::invalid_field("photo", "The photo field is required"))?;
    let image = StorageService::decode(photo)?;

    let mut tx = pool.begin().await?;

    let cart = lock_cart(&mut tx, user_id)
        .await?
        .ok_or_else(|| AppError::conflict("Cart is empty"))?;
    if load_details(&mut tx, cart.id).await?.is_empty() {
        return Err(AppError::conflict("Cart is empty"));
    }

    let image_path = storage.save_image(PHOTO_DIR, &image).await?;

    let submitted: Result<TransactionRecord> = async {
        refresh_totals(&mut tx, cart.id).await?;

        let submitted = sqlx::query_as::<_, Transaction>(
            r#"
            UPDATE transactions
            SET status = 'pending', pickup_location = $1, image_path = $2,
                verification_token = $3, token_expires_at = $4, updated_at = NOW()
            WHERE id = $5
            RETURNING *
            "#,
        )
        .bind(&pickup_location)
        .bind(&image_path)
        .bind(verification_token())
        .bind(Utc::now() + Duration::hours(VERIFICATION_TOKEN_TTL_HOURS))
        .bind(cart.id)
        .fetch_one(&mut *tx)
        .await?;

        record(&mut tx, submitted, false).await
    }
    .await;

    let submitted = match submitted {
        Ok(submitted) => submitted,
        Err(e) => {
            storage.delete(&image_path).await;
            return Err(e);
        }
    };

    if let Err(e) = tx.commit().await {
        storage.delete(&image_path).await;
        return Err(e.into());
    }

    tracing::info!(
        transaction_id = submitted.transaction.id,
        user_id,
        total_weight = %submitted.transaction.total_weight,
        total_price = %submitted.transaction.total_price,
        "cart submitted"
    );
    Ok(submitted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::transaction::TransactionStatus;
    use crate::models::user::UserRole;
    use crate::test_support::{category_id, d, insert_user, png, scratch_storage};

    #[test]
    fn verification_token_is_32_alphanumerics() {
        let token = verification_token();
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(token, verification_token());
    }

    #[test]
    fn weights_must_be_positive_after_rounding() {
        assert_eq!(positive_weight(d("2.505")).unwrap(), d("2.50"));
        assert!(positive_weight(d("0")).is_err());
        assert!(positive_weight(d("-3")).is_err());
        assert!(positive_weight(d("0.001")).is_err());
    }

    #[test]
    fn weights_are_capped_at_column_range() {
        assert_eq!(positive_weight(d("999999.99")).unwrap(), d("999999.99"));
        assert!(matches!(
            positive_weight(d("1000000")),
            Err(AppError::Validation { .. })
        ));
        assert!(positive_weight(d("79228162514264337593543950335")).is_err());
    }

    #[test]
    fn accumulated_cart_prices_like_the_cardboard_example() {
        let totals = Totals::from_lines(vec![(d("5") + d("5"), d("1700"))]).unwrap();
        assert_eq!(totals.weight, d("10"));
        assert_eq!(totals.price, d("17000"));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn adding_the_same_category_twice_accumulates_one_line(pool: PgPool) {
        let user = insert_user(&pool, UserRole::User, d("0")).await;
        let kardus = category_id(&pool, "Kardus").await;

        add_item(&pool, user.id, kardus, d("5")).await.unwrap();
        let cart = add_item(&pool, user.id, kardus, d("5")).await.unwrap();

        assert_eq!(cart.details.len(), 1);
        assert_eq!(cart.details[0].estimated_weight, d("10"));
        assert_eq!(cart.transaction.total_weight, d("10"));
        assert_eq!(cart.transaction.total_price, d("17000"));

        let carts: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM transactions WHERE user_id = $1 AND status = 'cart'",
        )
        .bind(user.id)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(carts, 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn accumulation_past_the_column_range_is_refused(pool: PgPool) {
        let user = insert_user(&pool, UserRole::User, d("0")).await;
        let kardus = category_id(&pool, "Kardus").await;

        add_item(&pool, user.id, kardus, d("999999")).await.unwrap();
        let err = add_item(&pool, user.id, kardus, d("1")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        let cart = current(&pool, user.id).await.unwrap().unwrap();
        assert_eq!(cart.details[0].estimated_weight, d("999999"));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn submitting_an_empty_cart_is_a_bad_request(pool: PgPool) {
        let user = insert_user(&pool, UserRole::User, d("0")).await;
        let storage = scratch_storage();

        let err = submit(&pool, &storage, user.id, Some("Jl. Merdeka 1".into()), Some(png()))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);

        // a cart whose only line was removed is gone, so it is empty too
        let kardus = category_id(&pool, "Kardus").await;
        let cart = add_item(&pool, user.id, kardus, d("2")).await.unwrap();
        remove_item(&pool, user.id, cart.details[0].id).await.unwrap();
        let err = submit(&pool, &storage, user.id, Some("Jl. Merdeka 1".into()), Some(png()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict { .. }));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn submit_moves_the_cart_to_pending(pool: PgPool) {
        let user = insert_user(&pool, UserRole::User, d("0")).await;
        let kardus = category_id(&pool, "Kardus").await;
        let storage = scratch_storage();

        add_item(&pool, user.id, kardus, d("3")).await.unwrap();
        let submitted = submit(&pool, &storage, user.id, Some(" Jl. Merdeka 1 ".into()), Some(png()))
            .await
            .unwrap();

        let tx = &submitted.transaction;
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert_eq!(tx.pickup_location.as_deref(), Some("Jl. Merdeka 1"));
        assert_eq!(tx.total_price, d("5100"));
        assert_eq!(tx.verification_token.as_ref().map(String::len), Some(32));
        assert!(current(&pool, user.id).await.unwrap().is_none());
    }
}
