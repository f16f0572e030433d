use std::path::Path;

use tracing::{info, warn};

use crate::error::AppError;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://sports_academy.db?mode=rwc";
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24;
pub const DEFAULT_SESSION_CLEANUP_INTERVAL_SECS: u64 = 3600;

pub fn load_environment() -> Result<(), Box<dyn std::error::Error>> {
    let is_production =
        dotenvy::var("ROCKET_PROFILE").unwrap_or("development".to_string()) == "production";

    let env_files = if is_production {
        vec!["config/common.env", "config/prod.env", ".secrets.env"]
    } else {
        vec!["config/common.env", "config/dev.env", ".secrets.env"]
    };

    for env_file in env_files {
        load_env_file(env_file)?;
    }

    Ok(())
}

fn load_env_file(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !Path::new(path).exists() {
        warn!("Warning: Environment file {} not found, skipping", path);
        return Ok(());
    }

    dotenvy::from_filename_override(path)?;
    info!("Loaded environment from: {}", path);
    Ok(())
}

/// Application settings that live outside Rocket's own figment config.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub database_url: String,
    pub session_ttl_hours: i64,
    pub session_cleanup_interval_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
            session_cleanup_interval_secs: DEFAULT_SESSION_CLEANUP_INTERVAL_SECS,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, AppError> {
        let defaults = Settings::default();

        let database_url = dotenvy::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or(defaults.database_url);

        Ok(Self {
            database_url,
            session_ttl_hours: parse_var("SESSION_TTL_HOURS", defaults.session_ttl_hours)?,
            session_cleanup_interval_secs: parse_var(
                "SESSION_CLEANUP_INTERVAL_SECS",
                defaults.session_cleanup_interval_secs,
            )?,
        })
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match dotenvy::var(name) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|e| {
            AppError::Internal(format!("Invalid value for {}: {} ({})", name, raw, e))
        }),
        Err(_) => Ok(default),
    }
}
