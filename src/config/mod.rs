// src/config/mod.rs
// All tunables load from the environment, with .env support and typed defaults.

use once_cell::sync::Lazy;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Config {
    // ── Gemini Configuration
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub provider_timeout_secs: u64,

    // ── Database Configuration
    pub database_url: String,
    pub sqlite_max_connections: u32,

    // ── Storage Configuration
    pub storage_root: String,

    // ── Session Configuration
    pub session_ttl_secs: i64,
    pub sweep_interval_secs: u64,

    // ── Batch Policy
    pub fail_on_empty_batch: bool,

    // ── Server Configuration
    pub host: String,
    pub port: u16,

    // ── Logging Configuration
    pub log_level: String,
}

fn env_var_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    match std::env::var(key) {
        Ok(val) => {
            let clean_val = val.split('#').next().unwrap_or("").trim();
            match clean_val.parse::<T>() {
                Ok(parsed) => parsed,
                Err(_) => {
                    eprintln!("Config: {key} = '{val}' (parse failed, using default)");
                    default
                }
            }
        }
        Err(_) => default,
    }
}

impl Config {
    pub fn from_env() -> Self {
        if dotenvy::dotenv().is_err() {
            eprintln!("Warning: .env file not found. Using environment variables and defaults.");
        }

        Self {
            gemini_api_key: std::env::var("GEMINI_API_KEY").unwrap_or_default(),
            gemini_model: env_var_or("CRAFTLENS_MODEL", "gemini-3-pro".to_string()),
            provider_timeout_secs: env_var_or("CRAFTLENS_PROVIDER_TIMEOUT", 120),
            database_url: env_var_or(
                "DATABASE_URL",
                "sqlite:./craftlens.db?mode=rwc".to_string(),
            ),
            sqlite_max_connections: env_var_or("SQLITE_MAX_CONNECTIONS", 5),
            storage_root: env_var_or("CRAFTLENS_STORAGE_ROOT", ".".to_string()),
            session_ttl_secs: env_var_or("CRAFTLENS_SESSION_TTL", 86_400),
            sweep_interval_secs: env_var_or("CRAFTLENS_SWEEP_INTERVAL", 3_600),
            fail_on_empty_batch: env_var_or("CRAFTLENS_FAIL_ON_EMPTY_BATCH", false),
            host: env_var_or("CRAFTLENS_HOST", "0.0.0.0".to_string()),
            port: env_var_or("CRAFTLENS_PORT", 5000),
            log_level: env_var_or("CRAFTLENS_LOG_LEVEL", "info".to_string()),
        }
    }

    /// Resolve the configured model key to the Gemini model id.
    pub fn model_id(&self) -> &'static str {
        match self.gemini_model.as_str() {
            "gemini-2.5-flash" => "gemini-2.5-flash-image",
            _ => "gemini-3-pro-image-preview",
        }
    }
}

pub static CONFIG: Lazy<Config> = Lazy::new(Config::from_env);
