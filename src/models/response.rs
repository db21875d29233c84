use serde::Serialize;
use serde_json::Value;
use serde_with::skip_serializing_none;

/// Envelope shared by every JSON endpoint: `{status, message?, data?}`.
#[skip_serializing_none]
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub status: bool,
    pub message: Option<String>,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            status: true,
            message: None,
            data: Some(data),
        }
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        ApiResponse {
            status: true,
            message: Some(message.into()),
            data: Some(data),
        }
    }
}

impl ApiResponse<Value> {
    pub fn message(message: impl Into<String>) -> Self {
        ApiResponse {
            status: true,
            message: Some(message.into()),
            data: None,
        }
    }
}
