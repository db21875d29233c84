// src/errors.rs
use std::collections::BTreeMap;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use thiserror::Error;

pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Multipart error: {0}")]
    Multipart(String),

    #[error("Validation failed: {message}")]
    Validation { message: String, errors: FieldErrors },

    #[error("Unauthenticated")]
    Unauthenticated,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{message}")]
    Conflict { message: String, data: Option<Value> },

    #[error("{message}")]
    RateLimited {
        message: String,
        retry_after: Option<i64>,
        next_available: Option<DateTime<Utc>>,
    },

    #[error("External API error: {0}")]
    ExternalApi(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let mut body = json!({ "status": false });
        match &self {
            AppError::Validation { message, errors } => {
                body["message"] = json!(message);
                body["errors"] = json!(errors);
            }
            AppError::Unauthenticated => body["message"] = json!("Unauthenticated"),
            AppError::InvalidCredentials => {
                body["message"] = json!("Invalid email/phone number or password")
            }
            AppError::Forbidden(msg) | AppError::NotFound(msg) => body["message"] = json!(msg),
            AppError::Conflict { message, data } => {
                body["message"] = json!(message);
                if let Some(data) = data {
                    body["data"] = data.clone();
                }
            }
            AppError::RateLimited {
                message,
                retry_after,
                next_available,
            } => {
                body["message"] = json!(message);
                body["data"] = json!({
                    "retry_after": retry_after,
                    "next_available": next_available,
                });
            }
            AppError::Multipart(msg) => body["message"] = json!(format!("Invalid multipart data: {}", msg)),
            AppError::ExternalApi(_) => {
                tracing::error!(error = %self, "upstream call failed");
                body["message"] = json!("Upstream service error");
            }
            AppError::Database(_)
            | AppError::Redis(_)
            | AppError::Io(_)
            | AppError::Internal(_) => {
                tracing::error!(error = %self, "request failed");
                body["message"] = json!("Internal server error");
            }
        }

        let mut response = (status, Json(body)).into_response();
        if let AppError::RateLimited {
            retry_after: Some(secs),
            ..
        } = &self
        {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        let mut errors = FieldErrors::new();
        for (field, field_errors) in err.field_errors() {
            let messages = field_errors
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{} is invalid", field))
                })
                .collect();
            errors.insert(field.to_string(), messages);
        }
        let message = errors
            .values()
            .flatten()
            .next()
            .cloned()
            .unwrap_or_else(|| "Validation failed".to_string());
        AppError::Validation { message, errors }
    }
}

impl From<axum::extract::rejection::JsonRejection> for AppError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        let message = rejection.body_text();
        let mut errors = FieldErrors::new();
        errors.insert("body".to_string(), vec![message.clone()]);
        AppError::Validation { message, errors }
    }
}

impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        AppError::Multipart(err.body_text())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::ExternalApi(format!("HTTP request failed: {}", err))
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        tracing::debug!("rejected bearer token: {}", err);
        AppError::Unauthenticated
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(err: bcrypt::BcryptError) -> Self {
        AppError::Internal(format!("password hashing failed: {}", err))
    }
}

// Helper conversion functions
impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Unauthenticated | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } | AppError::Multipart(_) => StatusCode::BAD_REQUEST,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::ExternalApi(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_)
            | AppError::Redis(_)
            | AppError::Io(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Single-field validation failure.
    pub fn invalid_field(field: &str, msg: impl Into<String>) -> Self {
        let message = msg.into();
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), vec![message.clone()]);
        AppError::Validation { message, errors }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        AppError::Conflict {
            message: msg.into(),
            data: None,
        }
    }

    pub fn conflict_with(msg: impl Into<String>, data: Value) -> Self {
        AppError::Conflict {
            message: msg.into(),
            data: Some(data),
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        AppError::Forbidden(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
