// services/otp_throttle.rs
use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Local, NaiveDate, Utc};
use redis::aio::ConnectionManager;

use crate::errors::{AppError, Result};
use crate::models::otp::{DAILY_SEND_LIMIT, RESEND_COOLDOWN_SECS, RESEND_LIMIT};

const DAILY_KEY_TTL_SECS: i64 = 2 * 24 * 60 * 60;
const SESSION_TTL_SECS: i64 = 24 * 60 * 60;

/// Per-user OTP rate limiting. Every check-and-increment is atomic so
/// concurrent requests cannot both slip under a limit.
#[async_trait]
pub trait OtpThrottle: Send + Sync {
    /// Counts one send against today's quota and opens a resend session.
    /// Returns how many sends the user has made today, this one included.
    async fn acquire_send(&self, user_id: i64, now: DateTime<Local>) -> Result<i64>;

    /// Counts one resend, enforcing the resend cap and cooldown.
    async fn acquire_resend(&self, user_id: i64, now: DateTime<Local>) -> Result<()>;

    /// Forgets all counters for the user.
    async fn clear(&self, user_id: i64, now: DateTime<Local>) -> Result<()>;
}

/// Start of the next local calendar day.
pub fn next_local_day(now: DateTime<Local>) -> DateTime<Utc> {
    (now.date_naive() + Duration::days(1))
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| midnight.and_local_timezone(Local).earliest())
        .map(|midnight| midnight.with_timezone(&Utc))
        .unwrap_or_else(|| (now + Duration::hours(24)).with_timezone(&Utc))
}

fn daily_limit_reached(now: DateTime<Local>) -> AppError {
    let next_available = next_local_day(now);
    AppError::RateLimited {
        message: format!(
            "You have reached the maximum of {} OTP requests today. Please try again tomorrow.",
            DAILY_SEND_LIMIT
        ),
        retry_after: Some((next_available - now.with_timezone(&Utc)).num_seconds().max(1)),
        next_available: Some(next_available),
    }
}

fn resend_limit_reached() -> AppError {
    AppError::RateLimited {
        message: format!("You have reached the maximum of {} OTP resends", RESEND_LIMIT),
        retry_after: None,
        next_available: None,
    }
}

fn cooling_down(retry_after: i64) -> AppError {
    AppError::RateLimited {
        message: format!("Please wait {} seconds before requesting a new OTP", retry_after),
        retry_after: Some(retry_after),
        next_available: None,
    }
}

fn no_session() -> AppError {
    AppError::conflict("Please request an OTP first")
}

#[derive(Clone)]
pub struct RedisOtpThrottle {
    conn: ConnectionManager,
}

impl RedisOtpThrottle {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    fn daily_key(user_id: i64, now: DateTime<Local>) -> String {
        format!("otp:daily:{}:{}", user_id, now.format("%Y-%m-%d"))
    }

    fn session_key(user_id: i64) -> String {
        format!("otp:session:{}", user_id)
    }

    fn resend_key(user_id: i64) -> String {
        format!("otp:resend:{}", user_id)
    }

    fn resend_lock_key(user_id: i64) -> String {
        format!("otp:resend_lock:{}", user_id)
    }
}

#[async_trait]
impl OtpThrottle for RedisOtpThrottle {
    async fn acquire_send(&self, user_id: i64, now: DateTime<Local>) -> Result<i64> {
        let mut conn = self.conn.clone();
        let daily = Self::daily_key(user_id, now);

        let (count,): (i64,) = redis::pipe()
            .atomic()
            .cmd("INCR")
            .arg(&daily)
            .cmd("EXPIRE")
            .arg(&daily)
            .arg(DAILY_KEY_TTL_SECS)
            .ignore()
            .query_async(&mut conn)
            .await?;

        if count > DAILY_SEND_LIMIT {
            redis::cmd("DECR")
                .arg(&daily)
                .query_async::<_, ()>(&mut conn)
                .await?;
            return Err(daily_limit_reached(now));
        }

        redis::pipe()
            .atomic()
            .cmd("SET")
            .arg(Self::session_key(user_id))
            .arg(now.timestamp())
            .arg("EX")
            .arg(SESSION_TTL_SECS)
            .ignore()
            .cmd("DEL")
            .arg(Self::resend_key(user_id))
            .arg(Self::resend_lock_key(user_id))
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;

        Ok(count)
    }

    async fn acquire_resend(&self, user_id: i64, _now: DateTime<Local>) -> Result<()> {
        let mut conn = self.conn.clone();

        let has_session: bool = redis::cmd("EXISTS")
            .arg(Self::session_key(user_id))
            .query_async(&mut conn)
            .await?;
        if !has_session {
            return Err(no_session());
        }

        let resend = Self::resend_key(user_id);
        let (count,): (i64,) = redis::pipe()
            .atomic()
            .cmd("INCR")
            .arg(&resend)
            .cmd("EXPIRE")
            .arg(&resend)
            .arg(SESSION_TTL_SECS)
            .ignore()
            .query_async(&mut conn)
            .await?;

        if count > RESEND_LIMIT {
            redis::cmd("DECR")
                .arg(&resend)
                .query_async::<_, ()>(&mut conn)
                .await?;
            return Err(resend_limit_reached());
        }

        let lock = Self::resend_lock_key(user_id);
        let acquired: Option<String> = redis::cmd("SET")
            .arg(&lock)
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(RESEND_COOLDOWN_SECS)
            .query_async(&mut conn)
            .await?;

        if acquired.is_none() {
            let ttl: i64 = redis::cmd("TTL").arg(&lock).query_async(&mut conn).await?;
            redis::cmd("DECR")
                .arg(&resend)
                .query_async::<_, ()>(&mut conn)
                .await?;
            return Err(cooling_down(ttl.max(1)));
        }

        Ok(())
    }

    async fn clear(&self, user_id: i64, now: DateTime<Local>) -> Result<()> {
        let mut conn = self.conn.clone();
        redis::cmd("DEL")
            .arg(Self::daily_key(user_id, now))
            .arg(Self::session_key(user_id))
            .arg(Self::resend_key(user_id))
            .arg(Self::resend_lock_key(user_id))
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
struct ThrottleEntry {
    request_count: i64,
    last_request_date: Option<NaiveDate>,
    resend_count: i64,
    last_resend: Option<DateTime<Local>>,
    session_started: Option<DateTime<Local>>,
}

impl ThrottleEntry {
    fn session_live(&self, now: DateTime<Local>) -> bool {
        self.session_started
            .map(|started| now - started < Duration::seconds(SESSION_TTL_SECS))
            .unwrap_or(false)
    }
}

/// Process-local throttle for single-instance deployments and tests.
#[derive(Debug, Default)]
pub struct MemoryOtpThrottle {
    entries: Mutex<HashMap<i64, ThrottleEntry>>,
}

impl MemoryOtpThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_entries<T>(&self, f: impl FnOnce(&mut HashMap<i64, ThrottleEntry>) -> T) -> T {
        let mut entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut entries)
    }

    #[cfg(test)]
    fn tracked_users(&self) -> usize {
        self.with_entries(|entries| entries.len())
    }
}

#[async_trait]
impl OtpThrottle for MemoryOtpThrottle {
    async fn acquire_send(&self, user_id: i64, now: DateTime<Local>) -> Result<i64> {
        self.with_entries(|entries| {
            let today = now.date_naive();
            // drop users whose quota day and resend session have both lapsed
            entries.retain(|id, entry| {
                *id == user_id || entry.last_request_date == Some(today) || entry.session_live(now)
            });

            let entry = entries.entry(user_id).or_default();
            if entry.last_request_date != Some(today) {
                entry.request_count = 0;
                entry.last_request_date = Some(today);
            }
            if entry.request_count >= DAILY_SEND_LIMIT {
                return Err(daily_limit_reached(now));
            }
            entry.request_count += 1;
            entry.resend_count = 0;
            entry.last_resend = None;
            entry.session_started = Some(now);
            Ok(entry.request_count)
        })
    }

    async fn acquire_resend(&self, user_id: i64, now: DateTime<Local>) -> Result<()> {
        self.with_entries(|entries| {
            let entry = match entries.get_mut(&user_id) {
                Some(entry) => entry,
                None => return Err(no_session()),
            };
            if !entry.session_live(now) {
                return Err(no_session());
            }
            if entry.resend_count >= RESEND_LIMIT {
                return Err(resend_limit_reached());
            }
            if let Some(last) = entry.last_resend {
                let elapsed = (now - last).num_seconds();
                if elapsed < RESEND_COOLDOWN_SECS {
                    return Err(cooling_down((RESEND_COOLDOWN_SECS - elapsed).max(1)));
                }
            }
            entry.resend_count += 1;
            entry.last_resend = Some(now);
            Ok(())
        })
    }

    async fn clear(&self, user_id: i64, _now: DateTime<Local>) -> Result<()> {
        self.with_entries(|entries| {
            entries.remove(&user_id);
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, m, d, h, min, s).earliest().unwrap()
    }

    #[tokio::test]
    async fn fourth_send_in_a_day_is_rate_limited() {
        let throttle = MemoryOtpThrottle::new();
        let morning = at(2025, 5, 27, 9, 0, 0);
        for expected in 1..=3 {
            assert_eq!(throttle.acquire_send(7, morning).await.unwrap(), expected);
        }

        let err = throttle.acquire_send(7, morning).await.unwrap_err();
        match err {
            AppError::RateLimited { next_available, .. } => {
                assert_eq!(next_available, Some(next_local_day(morning)));
            }
            other => panic!("expected rate limit, got {:?}", other),
        }

        assert_eq!(throttle.acquire_send(7, at(2025, 5, 28, 0, 0, 1)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn lapsed_users_are_pruned_on_send() {
        let throttle = MemoryOtpThrottle::new();
        throttle.acquire_send(1, at(2025, 5, 27, 9, 0, 0)).await.unwrap();
        throttle.acquire_send(2, at(2025, 5, 28, 8, 0, 0)).await.unwrap();
        // user 1's session is still inside its 24h window
        assert_eq!(throttle.tracked_users(), 2);

        // user 1 is a day old and past its session; user 2 sent today
        throttle.acquire_send(3, at(2025, 5, 28, 20, 0, 0)).await.unwrap();
        assert_eq!(throttle.tracked_users(), 2);

        throttle.acquire_send(3, at(2025, 5, 31, 10, 0, 0)).await.unwrap();
        assert_eq!(throttle.tracked_users(), 1);
    }

    #[tokio::test]
    async fn resend_requires_a_prior_send() {
        let throttle = MemoryOtpThrottle::new();
        let err = throttle.acquire_resend(1, at(2025, 5, 27, 9, 0, 0)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict { .. }));
    }

    #[tokio::test]
    async fn resend_enforces_cooldown_and_cap() {
        let throttle = MemoryOtpThrottle::new();
        let t0 = at(2025, 5, 27, 9, 0, 0);
        throttle.acquire_send(1, t0).await.unwrap();

        throttle.acquire_resend(1, t0).await.unwrap();
        let err = throttle
            .acquire_resend(1, t0 + Duration::seconds(10))
            .await
            .unwrap_err();
        match err {
            AppError::RateLimited { retry_after, .. } => assert_eq!(retry_after, Some(20)),
            other => panic!("expected cooldown, got {:?}", other),
        }

        throttle.acquire_resend(1, t0 + Duration::seconds(30)).await.unwrap();
        throttle.acquire_resend(1, t0 + Duration::seconds(60)).await.unwrap();

        let err = throttle
            .acquire_resend(1, t0 + Duration::seconds(120))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::RateLimited {
                retry_after: None,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn new_send_resets_resend_counter() {
        let throttle = MemoryOtpThrottle::new();
        let t0 = at(2025, 5, 27, 9, 0, 0);
        throttle.acquire_send(1, t0).await.unwrap();
        for i in 0..3 {
            throttle
                .acquire_resend(1, t0 + Duration::seconds(31 * i))
                .await
                .unwrap();
        }
        throttle.acquire_send(1, t0 + Duration::minutes(5)).await.unwrap();
        throttle
            .acquire_resend(1, t0 + Duration::minutes(5))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn clear_forgets_everything() {
        let throttle = MemoryOtpThrottle::new();
        let t0 = at(2025, 5, 27, 9, 0, 0);
        for _ in 0..3 {
            throttle.acquire_send(3, t0).await.unwrap();
        }
        throttle.clear(3, t0).await.unwrap();
        throttle.acquire_send(3, t0).await.unwrap();
    }

    #[test]
    fn next_local_day_is_midnight_after_now() {
        let now = at(2025, 5, 27, 23, 59, 0);
        let next = next_local_day(now).with_timezone(&Local);
        assert_eq!(next.date_naive(), NaiveDate::from_ymd_opt(2025, 5, 28).unwrap());
        assert_eq!(next.format("%H:%M:%S").to_string(), "00:00:00");
    }
}
