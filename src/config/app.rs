use anyhow::{anyhow, Result};
use std::env;
use std::time::Duration;

use super::{non_empty, parsed_or};
use crate::models::Timezone;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub log_level: String,
    pub jwt_secret: String,
    /// Zone used for the scheduled promotion and for bare preset group dates
    pub default_timezone: Timezone,
    pub session_promotion_cron: String,
    pub plan_generator_url: Option<String>,
    pub plan_generator_api_key: Option<String>,
    pub plan_generator_timeout: Duration,
    pub recent_completed_days: i64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = parsed_or("PORT", 3000);
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let jwt_secret = env::var("JWT_SECRET")
            .unwrap_or_else(|_| "your-secret-key-change-in-production".to_string());

        let raw_timezone = env::var("DEFAULT_TIMEZONE").unwrap_or_else(|_| "+00:00".to_string());
        let default_timezone = raw_timezone
            .parse::<Timezone>()
            .map_err(|e| anyhow!("DEFAULT_TIMEZONE: {}", e))?;

        let session_promotion_cron =
            env::var("SESSION_PROMOTION_CRON").unwrap_or_else(|_| "0 0 * * * *".to_string());

        let recent_completed_days = parsed_or("RECENT_COMPLETED_DAYS", 7i64);

        Ok(AppConfig {
            host,
            port,
            environment,
            log_level,
            jwt_secret,
            default_timezone,
            session_promotion_cron,
            plan_generator_url: non_empty("PLAN_GENERATOR_URL"),
            plan_generator_api_key: non_empty("PLAN_GENERATOR_API_KEY"),
            plan_generator_timeout: Duration::from_secs(parsed_or("PLAN_GENERATOR_TIMEOUT_SECS", 30)),
            recent_completed_days: if recent_completed_days > 0 { recent_completed_days } else { 7 },
        })
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
