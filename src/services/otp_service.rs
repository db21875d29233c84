use std::sync::Arc;

use chrono::{Duration, Local, Utc};
use rand::Rng;
use sqlx::PgPool;

use crate::errors::{AppError, Result};
use crate::models::otp::{OtpIssued, OTP_TTL_MINUTES};
use crate::models::user::User;
use crate::services::mail_service::MailService;
use crate::services::otp_throttle::{next_local_day, OtpThrottle};

#[derive(Clone)]
pub struct OtpService {
    db: PgPool,
    throttle: Arc<dyn OtpThrottle>,
    mail: MailService,
}

impl OtpService {
    pub fn new(db: PgPool, throttle: Arc<dyn OtpThrottle>, mail: MailService) -> Self {
        Self { db, throttle, mail }
    }

    // Generate 6-digit OTP
    pub fn generate_otp() -> String {
        let mut rng = rand::thread_rng();
        format!("{:06}", rng.gen_range(0..1_000_000))
    }

    pub async fn send(&self, user: &User) -> Result<OtpIssued> {
        if user.has_live_otp(Utc::now()) {
            if let Some(expires_at) = user.otp_expires_at {
                return Ok(OtpIssued::new(expires_at, true));
            }
        }

        let now = Local::now();
        let used = self.throttle.acquire_send(user.id, now).await?;
        let issued = self.issue(user).await?.with_quota(used, next_local_day(now));
        tracing::info!(user_id = user.id, "OTP sent");
        Ok(issued)
    }

    pub async fn resend(&self, user: &User) -> Result<OtpIssued> {
        if user.email_verified {
            return Err(AppError::conflict("Email is already verified"));
        }

        self.throttle.acquire_resend(user.id, Local::now()).await?;
        let issued = self.issue(user).await?;
        tracing::info!(user_id = user.id, "OTP resent");
        Ok(issued)
    }

    pub async fn verify(&self, user: &User, code: &str) -> Result<()> {
        let (Some(stored), Some(expires_at)) = (&user.otp_code, user.otp_expires_at) else {
            return Err(AppError::conflict("Please request an OTP first"));
        };

        if expires_at <= Utc::now() {
            return Err(AppError::conflict("OTP has expired"));
        }

        if stored != code {
            return Err(AppError::conflict("Invalid OTP code"));
        }

        sqlx::query(
            r#"
            UPDATE users
            SET email_verified = TRUE, otp_code = NULL, otp_expires_at = NULL, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .execute(&self.db)
        .await?;

        self.throttle.clear(user.id, Local::now()).await?;
        tracing::info!(user_id = user.id, "email verified");
        Ok(())
    }

    async fn issue(&self, user: &User) -> Result<OtpIssued> {
        let code = Self::generate_otp();
        let expires_at = Utc::now() + Duration::minutes(OTP_TTL_MINUTES);

        sqlx::query(
            "UPDATE users SET otp_code = $1, otp_expires_at = $2, updated_at = NOW() WHERE id = $3",
        )
        .bind(&code)
        .bind(expires_at)
        .bind(user.id)
        .execute(&self.db)
        .await?;

        self.mail.send_otp(&user.email, &user.name, &code).await?;

        Ok(OtpIssued::new(expires_at, false))
    }
}
