use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub gigachat_authorization_key: String,
    pub gigachat_client_id: String,
    pub default_country_code: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            gigachat_authorization_key: env::var("GIGACHAT_AUTHORIZATION_KEY")
                .context("GIGACHAT_AUTHORIZATION_KEY must be set")?,
            gigachat_client_id: env::var("GIGACHAT_CLIENT_ID")
                .unwrap_or_else(|_| "019a8ace-6124-7f42-8b3c-cda182c21dc3".to_string()),
            default_country_code: env::var("DEFAULT_COUNTRY_CODE")
                .unwrap_or_else(|_| "+7".to_string()),
        })
    }
}
