use std::env;

use sqlx::SqlitePool;

use crate::mailer::MailQueue;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub jwt: JwtConfig,
    pub mail: MailQueue,
    pub google: GoogleConfig,
}

#[derive(Clone, Debug)]
pub struct JwtConfig {
    pub secret: String,
    pub expiration_hours: i64,
}

const DEFAULT_JWT_SECRET: &str = "lunabrew-dev-secret";

impl JwtConfig {
    pub fn from_env() -> Self {
        let secret = env::var("JWT_SECRET").unwrap_or_else(|_| DEFAULT_JWT_SECRET.to_string());
        if secret == DEFAULT_JWT_SECRET {
            log::warn!("JWT_SECRET not set. Using the built-in development secret. Set JWT_SECRET in production.");
        }

        let expiration_hours = env::var("JWT_EXPIRATION_HOURS")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(24);

        Self {
            secret,
            expiration_hours,
        }
    }
}

#[derive(Clone, Debug)]
pub struct GoogleConfig {
    pub api_base: String,
    pub account_id: String,
    pub location_id: String,
    pub access_token: String,
}

impl GoogleConfig {
    pub fn from_env() -> Self {
        Self {
            api_base: env::var("GOOGLE_API_BASE")
                .unwrap_or_else(|_| "https://mybusiness.googleapis.com/v4".to_string()),
            account_id: env::var("GOOGLE_ACCOUNT_ID").unwrap_or_default(),
            location_id: env::var("GOOGLE_LOCATION_ID").unwrap_or_default(),
            access_token: env::var("GOOGLE_ACCESS_TOKEN").unwrap_or_default(),
        }
    }

    pub fn enabled(&self) -> bool {
        !(self.account_id.trim().is_empty()
            || self.location_id.trim().is_empty()
            || self.access_token.trim().is_empty())
    }
}
