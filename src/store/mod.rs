pub mod file;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::auth::{AuthSession, UserAccount};
use crate::config::{DataProvider, PortalConfig};
use crate::error::AppError;
use crate::models::{TeamProgress, TimerState};

use file::FileStore;
use sqlite::SqliteStore;

#[async_trait]
pub trait ProgressRepository: Send + Sync {
    async fn get(&self, team: &str) -> Result<Option<TeamProgress>, AppError>;
    async fn save(&self, progress: &TeamProgress) -> Result<(), AppError>;
    async fn all(&self) -> Result<Vec<TeamProgress>, AppError>;
}

#[async_trait]
pub trait TimerRepository: Send + Sync {
    async fn get(&self, team: &str) -> Result<Option<TimerState>, AppError>;
    async fn save(&self, state: &TimerState) -> Result<(), AppError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Username lookup is case-insensitive.
    async fn find(&self, username: &str) -> Result<Option<UserAccount>, AppError>;
    async fn all(&self) -> Result<Vec<UserAccount>, AppError>;
    async fn upsert(&self, account: &UserAccount) -> Result<(), AppError>;
    async fn remove(&self, username: &str) -> Result<bool, AppError>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<AuthSession>, AppError>;
    /// Also displaces any existing session held by the same username.
    async fn insert(&self, session: &AuthSession) -> Result<(), AppError>;
    async fn remove(&self, id: &str) -> Result<(), AppError>;
    async fn remove_for_user(&self, username: &str) -> Result<(), AppError>;
    async fn remove_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError>;
}

/// The four repositories behind trait objects, so nothing outside this
/// module knows which backend is configured.
#[derive(Clone)]
pub struct Storage {
    pub progress: Arc<dyn ProgressRepository>,
    pub timers: Arc<dyn TimerRepository>,
    pub users: Arc<dyn UserRepository>,
    pub sessions: Arc<dyn SessionRepository>,
}

impl Storage {
    pub async fn from_config(config: &PortalConfig) -> Result<Self, AppError> {
        match config.data_provider {
            DataProvider::File => Ok(Storage::file(FileStore::open(&config.data_dir)?)),
            DataProvider::Sqlite => {
                let store = SqliteStore::connect(&config.database_url).await?;
                Ok(Storage::sqlite(store))
            }
        }
    }

    pub fn file(store: Arc<FileStore>) -> Self {
        Storage {
            progress: store.clone(),
            timers: store.clone(),
            users: store.clone(),
            sessions: store,
        }
    }

    pub fn sqlite(store: Arc<SqliteStore>) -> Self {
        Storage {
            progress: store.clone(),
            timers: store.clone(),
            users: store.clone(),
            sessions: store,
        }
    }
}
