// services/verification.rs
//! Pure rules for collector verification and admin approval.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;

use crate::dtos::transaction_dtos::{ActualWeights, AdminAction, AdminActionRequest};
use crate::errors::{AppError, Result};
use crate::models::transaction::{DetailRow, Totals, Transaction, TransactionStatus, MAX_WEIGHT};

/// Total actual weight (kg) from which a verification needs admin approval.
pub const AUTO_VERIFY_WEIGHT_LIMIT: Decimal = Decimal::from_parts(20, 0, 0, false, 0);

/// Reads a JSON number or numeric string as a weight with two decimals.
/// Anything non-numeric, not strictly positive or above `MAX_WEIGHT` yields `None`.
pub fn parse_weight(value: &Value) -> Option<Decimal> {
    let raw = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    let weight = Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .ok()?
        .round_dp(2);
    (weight > Decimal::ZERO && weight <= MAX_WEIGHT).then_some(weight)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightDifference {
    pub detail_id: i64,
    pub category: String,
    pub estimated: Decimal,
    pub actual: Decimal,
    pub difference: Decimal,
    pub was_updated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationOutcome {
    Verified,
    AwaitingApproval,
}

#[derive(Debug, Clone)]
pub struct VerificationPlan {
    /// `(detail_id, actual_weight)` for every line, in detail order.
    pub weights: Vec<(i64, Decimal)>,
    pub totals: Totals,
    pub differences: Vec<WeightDifference>,
    pub outcome: VerificationOutcome,
}

/// Only pending transactions can be (re)verified.
pub fn ensure_verifiable(tx: &Transaction) -> Result<()> {
    if tx.status != TransactionStatus::Pending {
        return Err(AppError::conflict(
            "Transaction has already been verified or rejected",
        ));
    }
    Ok(())
}

/// Resolves the actual weight of every line and the resulting totals.
/// Validation is all-or-nothing: one bad entry rejects the whole request.
pub fn plan_verification(details: &[DetailRow], input: &ActualWeights) -> Result<VerificationPlan> {
    if details.is_empty() {
        return Err(AppError::conflict("Transaction has no items"));
    }

    let resolved: Vec<(Decimal, bool)> = match input {
        ActualWeights::All(value) => {
            let weight = parse_weight(value).ok_or_else(|| {
                AppError::invalid_field(
                    "actualWeights",
                    format!("Weight must be a number greater than 0 and at most {}", MAX_WEIGHT),
                )
            })?;
            details.iter().map(|_| (weight, true)).collect()
        }
        ActualWeights::PerLine(values) => {
            let parsed = values
                .iter()
                .map(parse_weight)
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| {
                    AppError::invalid_field(
                        "actualWeights",
                        format!("All weights must be numbers greater than 0 and at most {}", MAX_WEIGHT),
                    )
                })?;
            details
                .iter()
                .enumerate()
                .map(|(index, detail)| match parsed.get(index) {
                    Some(weight) => (*weight, true),
                    None => (
                        detail
                            .actual_weight
                            .filter(|w| *w > Decimal::ZERO)
                            .unwrap_or(detail.estimated_weight),
                        false,
                    ),
                })
                .collect()
        }
    };

    let totals = Totals::from_lines(
        details
            .iter()
            .zip(&resolved)
            .map(|(detail, (weight, _))| (*weight, detail.unit_price)),
    )
    .ok_or_else(|| AppError::invalid_field("actualWeights", "Total weight or price is too large"))?;

    let differences = details
        .iter()
        .zip(&resolved)
        .map(|(detail, (actual, was_updated))| WeightDifference {
            detail_id: detail.id,
            category: detail.category_name.clone(),
            estimated: detail.estimated_weight,
            actual: *actual,
            difference: *actual - detail.estimated_weight,
            was_updated: *was_updated,
        })
        .collect();

    let outcome = if totals.weight < AUTO_VERIFY_WEIGHT_LIMIT {
        VerificationOutcome::Verified
    } else {
        VerificationOutcome::AwaitingApproval
    };

    Ok(VerificationPlan {
        weights: details
            .iter()
            .zip(&resolved)
            .map(|(detail, (weight, _))| (detail.id, *weight))
            .collect(),
        totals,
        differences,
        outcome,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminDecision {
    Approve,
    Reject { reason: String },
}

/// Admin action is legal only on a pending transaction parked for approval.
pub fn ensure_awaiting_approval(tx: &Transaction) -> Result<()> {
    if tx.status != TransactionStatus::Pending {
        return Err(AppError::conflict("Transaction is not pending"));
    }
    if !tx.awaiting_approval || tx.total_weight < AUTO_VERIFY_WEIGHT_LIMIT {
        return Err(AppError::conflict(
            "This transaction does not need admin approval",
        ));
    }
    Ok(())
}

pub fn admin_decision(req: &AdminActionRequest) -> Result<AdminDecision> {
    match req.action {
        AdminAction::Approve => Ok(AdminDecision::Approve),
        AdminAction::Reject => {
            let reason = req
                .reason
                .as_deref()
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .ok_or_else(|| {
                    AppError::invalid_field("reason", "A reason is required when rejecting")
                })?;
            Ok(AdminDecision::Reject {
                reason: reason.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::waste_category::WasteType;
    use crate::test_support::d;
    use chrono::Utc;
    use serde_json::json;

    fn line(id: i64, estimated: &str, actual: Option<&str>, price: &str) -> DetailRow {
        let now = Utc::now();
        DetailRow {
            id,
            transaction_id: 1,
            category_id: id,
            estimated_weight: d(estimated),
            actual_weight: actual.map(d),
            unit_price: d(price),
            photo_path: None,
            created_at: now,
            updated_at: now,
            category_name: format!("Category {}", id),
            category_type: WasteType::Inorganic,
            category_price_per_kg: d(price),
        }
    }

    fn pending(total_weight: &str, awaiting_approval: bool) -> Transaction {
        let now = Utc::now();
        Transaction {
            id: 1,
            user_id: 1,
            pickup_location: Some("Jl. Merdeka 1".into()),
            total_weight: d(total_weight),
            total_price: Decimal::ZERO,
            status: TransactionStatus::Pending,
            image_path: None,
            verification_token: None,
            token_expires_at: None,
            awaiting_approval,
            verified_by: None,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn parse_weight_accepts_numbers_and_numeric_strings() {
        assert_eq!(parse_weight(&json!(10)), Some(d("10")));
        assert_eq!(parse_weight(&json!(2.5)), Some(d("2.5")));
        assert_eq!(parse_weight(&json!(" 3.25 ")), Some(d("3.25")));
        assert_eq!(parse_weight(&json!(0)), None);
        assert_eq!(parse_weight(&json!(-1)), None);
        assert_eq!(parse_weight(&json!("abc")), None);
        assert_eq!(parse_weight(&json!(null)), None);
        assert_eq!(parse_weight(&json!(true)), None);
    }

    #[test]
    fn parse_weight_caps_at_column_range() {
        assert_eq!(parse_weight(&json!("999999.99")), Some(d("999999.99")));
        assert_eq!(parse_weight(&json!(1000000)), None);
        assert_eq!(parse_weight(&json!(1e28)), None);
        assert_eq!(parse_weight(&json!(1e300)), None);
        assert_eq!(parse_weight(&json!("79228162514264337593543950335")), None);
    }

    #[test]
    fn huge_weights_are_rejected_not_multiplied() {
        let details = vec![line(1, "10", None, "1700"), line(2, "3", None, "1000")];
        let huge = json!("79228162514264337593543950335");

        let err = plan_verification(&details, &ActualWeights::All(huge.clone())).unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        let err = plan_verification(&details, &ActualWeights::PerLine(vec![json!(5), huge])).unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        let err = plan_verification(&details, &ActualWeights::All(json!(1e28))).unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[test]
    fn summed_weight_beyond_column_range_is_a_validation_error() {
        let details = vec![line(1, "10", None, "1"), line(2, "3", None, "1")];
        let err = plan_verification(&details, &ActualWeights::All(json!("999999.99"))).unwrap_err();
        match err {
            AppError::Validation { errors, .. } => assert!(errors.contains_key("actualWeights")),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn cardboard_scenario_auto_verifies() {
        let details = vec![line(1, "10", None, "1700")];
        let plan = plan_verification(&details, &ActualWeights::PerLine(vec![json!(10)])).unwrap();
        assert_eq!(plan.outcome, VerificationOutcome::Verified);
        assert_eq!(plan.totals.weight, d("10"));
        assert_eq!(plan.totals.price, d("17000"));
        assert_eq!(plan.weights, vec![(1, d("10"))]);
    }

    #[test]
    fn just_below_limit_auto_verifies() {
        let details = vec![line(1, "19", None, "1000")];
        let plan = plan_verification(&details, &ActualWeights::All(json!(19.99))).unwrap();
        assert_eq!(plan.totals.weight, d("19.99"));
        assert_eq!(plan.outcome, VerificationOutcome::Verified);
    }

    #[test]
    fn limit_itself_needs_admin_approval() {
        let details = vec![line(1, "15", None, "1000"), line(2, "5", None, "500")];
        let plan = plan_verification(&details, &ActualWeights::All(json!(10))).unwrap();
        assert_eq!(plan.totals.weight, d("20"));
        assert_eq!(plan.outcome, VerificationOutcome::AwaitingApproval);
        assert_eq!(plan.totals.price, d("15000"));
    }

    #[test]
    fn scalar_applies_to_every_line() {
        let details = vec![line(1, "2", None, "100"), line(2, "3", None, "200")];
        let plan = plan_verification(&details, &ActualWeights::All(json!("4"))).unwrap();
        assert_eq!(plan.weights, vec![(1, d("4")), (2, d("4"))]);
        assert!(plan.differences.iter().all(|diff| diff.was_updated));
        assert_eq!(plan.differences[0].difference, d("2"));
        assert_eq!(plan.differences[1].difference, d("1"));
    }

    #[test]
    fn missing_entries_fall_back_to_prior_actual_then_estimated() {
        let details = vec![
            line(1, "2", None, "100"),
            line(2, "3", Some("3.5"), "100"),
            line(3, "4", None, "100"),
        ];
        let plan = plan_verification(&details, &ActualWeights::PerLine(vec![json!(2.2)])).unwrap();
        assert_eq!(plan.weights, vec![(1, d("2.2")), (2, d("3.5")), (3, d("4"))]);
        let updated: Vec<bool> = plan.differences.iter().map(|diff| diff.was_updated).collect();
        assert_eq!(updated, vec![true, false, false]);
    }

    #[test]
    fn one_bad_entry_rejects_the_whole_call() {
        let details = vec![line(1, "2", None, "100"), line(2, "3", None, "100")];
        let err = plan_verification(
            &details,
            &ActualWeights::PerLine(vec![json!(5), json!("heavy")]),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        let err = plan_verification(&details, &ActualWeights::All(json!(0))).unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[test]
    fn payout_uses_snapshot_price() {
        let mut detail = line(1, "5", None, "1700");
        detail.category_price_per_kg = d("9999");
        let plan = plan_verification(&[detail], &ActualWeights::All(json!(5))).unwrap();
        assert_eq!(plan.totals.price, d("8500"));
    }

    #[test]
    fn terminal_transactions_cannot_be_verified_again() {
        let mut tx = pending("10", false);
        assert!(ensure_verifiable(&tx).is_ok());
        tx.status = TransactionStatus::Verified;
        assert!(matches!(ensure_verifiable(&tx), Err(AppError::Conflict { .. })));
    }

    #[test]
    fn admin_action_needs_the_approval_state() {
        assert!(ensure_awaiting_approval(&pending("25", true)).is_ok());
        assert!(ensure_awaiting_approval(&pending("10", false)).is_err());

        let mut done = pending("25", true);
        done.status = TransactionStatus::Verified;
        assert!(ensure_awaiting_approval(&done).is_err());
    }

    #[test]
    fn reject_requires_a_reason() {
        let missing = AdminActionRequest {
            action: AdminAction::Reject,
            reason: Some("   ".into()),
        };
        assert!(matches!(admin_decision(&missing), Err(AppError::Validation { .. })));

        let given = AdminActionRequest {
            action: AdminAction::Reject,
            reason: Some(" mixed with soil ".into()),
        };
        assert_eq!(
            admin_decision(&given).unwrap(),
            AdminDecision::Reject {
                reason: "mixed with soil".into()
            }
        );

        let approve = AdminActionRequest {
            action: AdminAction::Approve,
            reason: None,
        };
        assert_eq!(admin_decision(&approve).unwrap(), AdminDecision::Approve);
    }
}
