use serde::Deserialize;
use serde_json::Value;
use validator::Validate;

/// A single weight applied to every line, or one entry per line in detail order.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ActualWeights {
    PerLine(Vec<Value>),
    All(Value),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub actual_weights: ActualWeights,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdminAction {
    Approve,
    Reject,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AdminActionRequest {
    pub action: AdminAction,

    #[validate(length(max = 255, message = "Reason may not exceed 255 characters"))]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryFilter {
    Pending,
    History,
}

#[derive(Debug, Deserialize)]
pub struct TransactionListQuery {
    pub status: Option<HistoryFilter>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub query: String,
}
