use rust_decimal::Decimal;
use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateWithdrawalRequest {
    pub amount: Decimal,

    #[validate(length(min = 1, max = 64, message = "Method is required"))]
    pub method: String,

    #[validate(length(min = 10, max = 64, message = "Virtual account must be 10 to 64 characters"))]
    pub virtual_account: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalDecision {
    Accepted,
    Rejected,
}

#[derive(Debug, Deserialize)]
pub struct UpdateWithdrawalStatusRequest {
    pub status: WithdrawalDecision,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_must_be_a_known_decision() {
        let ok: UpdateWithdrawalStatusRequest =
            serde_json::from_str(r#"{"status": "accepted"}"#).unwrap();
        assert_eq!(ok.status, WithdrawalDecision::Accepted);
        assert!(serde_json::from_str::<UpdateWithdrawalStatusRequest>(r#"{"status": "expired"}"#).is_err());
    }
}
