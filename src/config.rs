// config.rs
use std::env;

use anyhow::{bail, Context, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone)]
pub struct AdminBootstrap {
    pub email: String,
    pub password: String,
    pub phone_number: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub redis_url: Option<String>,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub host: String,
    pub port: u16,
    pub upload_dir: String,
    pub public_base_url: String,
    pub mail_api_url: Option<String>,
    pub mail_api_key: String,
    pub mail_from: String,
    pub admin: Option<AdminBootstrap>,
    pub environment: Environment,
}

const DEV_JWT_SECRET: &str = "dev-secret-change-in-production";

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let environment = match non_empty("ENVIRONMENT")
            .unwrap_or_else(|| "development".to_string())
            .to_lowercase()
            .as_str()
        {
            "production" => Environment::Production,
            _ => Environment::Development,
        };

        let database_url = non_empty("DATABASE_URL").context("DATABASE_URL must be set")?;

        let jwt_secret = match non_empty("JWT_SECRET") {
            Some(secret) => secret,
            None if environment == Environment::Production => {
                bail!("JWT_SECRET must be set in production")
            }
            None => DEV_JWT_SECRET.to_string(),
        };

        let port = non_empty("PORT")
            .unwrap_or_else(|| "10000".to_string())
            .parse::<u16>()
            .context("PORT must be a number")?;

        let jwt_ttl_hours = non_empty("JWT_TTL_HOURS")
            .unwrap_or_else(|| "24".to_string())
            .parse::<i64>()
            .context("JWT_TTL_HOURS must be a number")?;
        if jwt_ttl_hours <= 0 {
            bail!("JWT_TTL_HOURS must be positive");
        }

        let admin = match (non_empty("ADMIN_EMAIL"), non_empty("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminBootstrap {
                email,
                password,
                phone_number: non_empty("ADMIN_PHONE").unwrap_or_else(|| "081234567890".to_string()),
            }),
            _ => None,
        };

        Ok(AppConfig {
            database_url,
            redis_url: non_empty("REDIS_URL"),
            jwt_secret,
            jwt_ttl_hours,
            host: non_empty("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            upload_dir: non_empty("UPLOAD_DIR").unwrap_or_else(|| "uploads".to_string()),
            public_base_url: non_empty("PUBLIC_BASE_URL")
                .unwrap_or_else(|| format!("http://localhost:{}", port))
                .trim_end_matches('/')
                .to_string(),
            mail_api_url: non_empty("MAIL_API_URL"),
            mail_api_key: non_empty("MAIL_API_KEY").unwrap_or_default(),
            mail_from: non_empty("MAIL_FROM").unwrap_or_else(|| "no-reply@wastebank.local".to_string()),
            admin,
            environment,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_in_development() {
        let config = AppConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/waste")])).unwrap();
        assert_eq!(config.port, 10000);
        assert_eq!(config.jwt_ttl_hours, 24);
        assert_eq!(config.jwt_secret, DEV_JWT_SECRET);
        assert_eq!(config.public_base_url, "http://localhost:10000");
        assert!(config.redis_url.is_none());
        assert!(config.admin.is_none());
        assert!(!config.is_production());
    }

    #[test]
    fn production_requires_jwt_secret() {
        let result = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/waste"),
            ("ENVIRONMENT", "production"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn missing_database_url_fails() {
        assert!(AppConfig::from_lookup(lookup(&[])).is_err());
    }

    #[test]
    fn admin_bootstrap_needs_email_and_password() {
        let config = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/waste"),
            ("ADMIN_EMAIL", "admin@example.com"),
            ("ADMIN_PASSWORD", "admin123"),
            ("PUBLIC_BASE_URL", "https://api.example.com/"),
        ]))
        .unwrap();
        let admin = config.admin.unwrap();
        assert_eq!(admin.email, "admin@example.com");
        assert_eq!(config.public_base_url, "https://api.example.com");
    }

    #[test]
    fn bad_port_is_rejected() {
        let result = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/waste"),
            ("PORT", "eighty"),
        ]));
        assert!(result.is_err());
    }
}
