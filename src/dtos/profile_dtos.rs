use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1 to 255 characters"))]
    pub name: Option<String>,

    #[validate(email(message = "Email must be a valid email address"))]
    pub email: Option<String>,

    #[validate(length(min = 8, max = 32, message = "Phone number must be 8 to 32 characters"))]
    pub phone_number: Option<String>,

    #[validate(length(max = 1000, message = "Address is too long"))]
    pub address: Option<String>,

    /// Base64 image, optionally as a `data:` URL.
    pub avatar: Option<String>,
}
