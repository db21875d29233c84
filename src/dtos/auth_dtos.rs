use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 255, message = "Name is required"))]
    pub name: String,

    #[validate(email(message = "Email must be a valid email address"))]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    #[validate(length(min = 8, max = 32, message = "Phone number must be 8 to 32 characters"))]
    pub phone_number: String,
}

/// `login` is either an email address or a phone number.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Email or phone number is required"))]
    pub login: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}
