use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyOtpRequest {
    #[validate(length(equal = 6, message = "OTP must be 6 digits"))]
    pub otp: String,
}
