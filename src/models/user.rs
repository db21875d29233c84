use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Collector,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Collector => "collector",
            UserRole::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub password_hash: String,
    pub role: UserRole,
    pub balance: Decimal,
    pub address: Option<String>,
    pub avatar_path: Option<String>,
    pub email_verified: bool,
    pub otp_code: Option<String>,
    pub otp_expires_at: Option<DateTime<Utc>>,
    pub token_version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn has_role(&self, roles: &[UserRole]) -> bool {
        roles.contains(&self.role)
    }

    /// True while an issued OTP has not yet expired.
    pub fn has_live_otp(&self, now: DateTime<Utc>) -> bool {
        matches!(
            (&self.otp_code, self.otp_expires_at),
            (Some(_), Some(expires_at)) if expires_at > now
        )
    }
}

/// The authenticated caller, placed in request extensions by `auth_middleware`.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl std::ops::Deref for CurrentUser {
    type Target = User;

    fn deref(&self) -> &User {
        &self.0
    }
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub role: UserRole,
    pub balance: Decimal,
    pub address: Option<String>,
    pub avatar_url: Option<String>,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl UserResponse {
    /// `url_for` turns the stored avatar path into a public URL.
    pub fn build<F>(user: &User, url_for: F) -> Self
    where
        F: Fn(&str) -> String,
    {
        UserResponse {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            phone_number: user.phone_number.clone(),
            role: user.role,
            balance: user.balance,
            address: user.address.clone(),
            avatar_url: user.avatar_path.as_deref().map(url_for),
            email_verified: user.email_verified,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub token: String,
    pub token_type: &'static str,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub role: UserRole,
    pub ver: i32,
    pub iat: usize,
    pub exp: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user() -> User {
        let now = Utc::now();
        User {
            id: 1,
            name: "Sari".into(),
            email: "sari@example.com".into(),
            phone_number: "0811".into(),
            password_hash: String::new(),
            role: UserRole::Collector,
            balance: Decimal::ZERO,
            address: None,
            avatar_path: None,
            email_verified: false,
            otp_code: None,
            otp_expires_at: None,
            token_version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn live_otp_requires_code_and_future_expiry() {
        let now = Utc::now();
        let mut u = user();
        assert!(!u.has_live_otp(now));

        u.otp_code = Some("012345".into());
        u.otp_expires_at = Some(now + Duration::minutes(10));
        assert!(u.has_live_otp(now));

        u.otp_expires_at = Some(now - Duration::seconds(1));
        assert!(!u.has_live_otp(now));
    }

    #[test]
    fn response_exposes_avatar_url_not_secrets() {
        let mut u = user();
        u.avatar_path = Some("avatars/a.png".into());
        u.otp_code = Some("123456".into());
        let body = serde_json::to_value(UserResponse::build(&u, |p| format!("http://cdn/{}", p))).unwrap();
        assert_eq!(body["avatar_url"], "http://cdn/avatars/a.png");
        assert!(body.get("otp_code").is_none());
        assert!(body.get("password_hash").is_none());
    }

    #[test]
    fn role_membership() {
        let u = user();
        assert!(u.has_role(&[UserRole::Collector, UserRole::Admin]));
        assert!(!u.has_role(&[UserRole::Admin]));
    }
}
