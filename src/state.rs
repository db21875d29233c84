use std::sync::Arc;

use sqlx::PgPool;

use crate::config::AppConfig;
use crate::services::mail_service::MailService;
use crate::services::otp_service::OtpService;
use crate::services::otp_throttle::OtpThrottle;
use crate::services::storage::StorageService;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<AppConfig>,
    pub otp_service: OtpService,
    pub storage: StorageService,
    pub redis_enabled: bool,
}

impl AppState {
    pub fn new(db: PgPool, config: AppConfig, otp_throttle: Arc<dyn OtpThrottle>) -> Self {
        let mail = MailService::new(
            config.mail_api_url.clone(),
            config.mail_api_key.clone(),
            config.mail_from.clone(),
        );
        let storage = StorageService::new(&config.upload_dir, config.public_base_url.clone());
        let otp_service = OtpService::new(db.clone(), otp_throttle, mail);

        AppState {
            db,
            config: Arc::new(config),
            otp_service,
            storage,
            redis_enabled: false,
        }
    }

    pub fn with_redis(mut self) -> Self {
        self.redis_enabled = true;
        self
    }
}
