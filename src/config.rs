use std::env;
use std::path::PathBuf;

use chrono::Duration;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataProvider {
    File,
    Sqlite,
}

impl DataProvider {
    pub fn from_str(s: &str) -> Result<Self, AppError> {
        match s.to_ascii_lowercase().as_str() {
            "file" => Ok(DataProvider::File),
            "sqlite" => Ok(DataProvider::Sqlite),
            other => Err(AppError::Configuration(format!(
                "unsupported data provider '{}', expected 'file' or 'sqlite'",
                other
            ))),
        }
    }
}

/// Runtime configuration, read from the environment once at startup.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub data_provider: DataProvider,
    pub data_dir: PathBuf,
    pub database_url: String,
    pub challenge_dir: PathBuf,
    pub session_hours: i64,
}

impl PortalConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let data_provider = DataProvider::from_str(
            &env::var("DATA_PROVIDER").unwrap_or_else(|_| "file".to_string()),
        )?;

        let data_dir = PathBuf::from(env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()));

        let database_url = match env::var("DATABASE_URL") {
            Ok(url) => url,
            Err(_) if data_provider == DataProvider::Sqlite => {
                return Err(AppError::Configuration(
                    "DATABASE_URL must be set when DATA_PROVIDER is 'sqlite'".to_string(),
                ));
            }
            Err(_) => String::new(),
        };

        let challenge_dir =
            PathBuf::from(env::var("CHALLENGE_DIR").unwrap_or_else(|_| "challenges".to_string()));

        let session_hours = match env::var("SESSION_HOURS") {
            Ok(value) => {
                let hours: i64 = value.parse().map_err(|_| {
                    AppError::Configuration(format!(
                        "SESSION_HOURS must be an integer, got '{}'",
                        value
                    ))
                })?;
                if hours <= 0 {
                    return Err(AppError::Configuration(
                        "SESSION_HOURS must be positive".to_string(),
                    ));
                }
                hours
            }
            Err(_) => 12,
        };

        Ok(PortalConfig {
            data_provider,
            data_dir,
            database_url,
            challenge_dir,
            session_hours,
        })
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::hours(self.session_hours)
    }
}
