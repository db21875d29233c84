use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_with::skip_serializing_none;

/// Validity of an issued code.
pub const OTP_TTL_MINUTES: i64 = 10;
/// Sends allowed per user per local calendar day.
pub const DAILY_SEND_LIMIT: i64 = 3;
/// Resends allowed after one send.
pub const RESEND_LIMIT: i64 = 3;
pub const RESEND_COOLDOWN_SECS: i64 = 30;

#[skip_serializing_none]
#[derive(Debug, Serialize)]
pub struct OtpIssued {
    pub expires_at: DateTime<Utc>,
    /// True when a still-valid code was already outstanding and nothing was sent.
    pub already_sent: bool,
    /// Only reported by a fresh send.
    pub remaining_requests_today: Option<i64>,
    pub next_available_request: Option<DateTime<Utc>>,
}

impl OtpIssued {
    pub fn new(expires_at: DateTime<Utc>, already_sent: bool) -> Self {
        OtpIssued {
            expires_at,
            already_sent,
            remaining_requests_today: None,
            next_available_request: None,
        }
    }

    /// Attaches the daily quota after `used` sends today.
    pub fn with_quota(mut self, used: i64, next_day: DateTime<Utc>) -> Self {
        self.remaining_requests_today = Some((DAILY_SEND_LIMIT - used).max(0));
        self.next_available_request = Some(next_day);
        self
    }
}
