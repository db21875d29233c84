pub mod auth_dtos;
pub mod cart_dtos;
pub mod category_dtos;
pub mod otp_dtos;
pub mod profile_dtos;
pub mod transaction_dtos;
pub mod withdrawal_dtos;

use axum::extract::FromRequest;

use crate::errors::AppError;

/// `Json` whose rejections render through `AppError` instead of axum's plain-text body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);
