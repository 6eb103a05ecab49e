use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::auth::{AuthSession, UserAccount};
use crate::error::AppError;
use crate::models::{TeamProgress, TimerState};

use super::{ProgressRepository, SessionRepository, TimerRepository, UserRepository};

const PROGRESS_FILE: &str = "progress.json";
const TIMERS_FILE: &str = "timers.json";
const USERS_FILE: &str = "users.json";
const SESSIONS_FILE: &str = "sessions.json";

/// Flat-JSON persistence under a single data directory.
///
/// Everything is loaded once when the store opens and each mutation
/// rewrites the affected file whole. User keys are lowercased so
/// lookups stay case-insensitive.
pub struct FileStore {
    dir: PathBuf,
    progress: RwLock<HashMap<String, TeamProgress>>,
    timers: RwLock<HashMap<String, TimerState>>,
    users: RwLock<HashMap<String, UserAccount>>,
    sessions: RwLock<HashMap<String, AuthSession>>,
}

impl FileStore {
    pub fn open(dir: &Path) -> Result<Arc<Self>, AppError> {
        fs::create_dir_all(dir)?;

        let progress: HashMap<String, TeamProgress> = load_or_default(&dir.join(PROGRESS_FILE));
        let timers: HashMap<String, TimerState> = load_or_default(&dir.join(TIMERS_FILE));
        let sessions: HashMap<String, AuthSession> = load_or_default(&dir.join(SESSIONS_FILE));

        let accounts: Vec<UserAccount> = load_or_default(&dir.join(USERS_FILE));
        let mut users = HashMap::with_capacity(accounts.len());
        for account in accounts {
            account.validate()?;
            users.insert(account.username.to_lowercase(), account);
        }

        info!(
            dir = %dir.display(),
            users = users.len(),
            teams = progress.len(),
            "Opened file store"
        );

        Ok(Arc::new(FileStore {
            dir: dir.to_path_buf(),
            progress: RwLock::new(progress),
            timers: RwLock::new(timers),
            users: RwLock::new(users),
            sessions: RwLock::new(sessions),
        }))
    }

    fn persist<T: Serialize>(&self, filename: &str, data: &T) -> Result<(), AppError> {
        let json = serde_json::to_vec_pretty(data)?;
        fs::write(self.dir.join(filename), json)?;
        Ok(())
    }

    // The users file stays a sorted list so organizers can edit it by
    // hand.
    fn persist_users(&self, users: &HashMap<String, UserAccount>) -> Result<(), AppError> {
        let mut accounts: Vec<&UserAccount> = users.values().collect();
        accounts.sort_by(|a, b| a.username.cmp(&b.username));
        self.persist(USERS_FILE, &accounts)
    }
}

/// Missing files mean a fresh install; unreadable or malformed JSON is
/// degraded to default state with a logged warning.
fn load_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    match fs::read_to_string(path) {
        Ok(raw) => match serde_json::from_str(&raw) {
            Ok(data) => data,
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "Malformed JSON, falling back to default state"
                );
                T::default()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => T::default(),
        Err(err) => {
            warn!(
                path = %path.display(),
                error = %err,
                "Unreadable file, falling back to default state"
            );
            T::default()
        }
    }
}

fn lock_error<T>(err: std::sync::PoisonError<T>) -> AppError {
    AppError::Storage(format!("lock poisoned: {}", err))
}

#[async_trait]
impl ProgressRepository for FileStore {
    async fn get(&self, team: &str) -> Result<Option<TeamProgress>, AppError> {
        let guard = self.progress.read().map_err(lock_error)?;
        Ok(guard.get(team).cloned())
    }

    async fn save(&self, progress: &TeamProgress) -> Result<(), AppError> {
        let mut guard = self.progress.write().map_err(lock_error)?;
        guard.insert(progress.team.clone(), progress.clone());
        self.persist(PROGRESS_FILE, &*guard)
    }

    async fn all(&self) -> Result<Vec<TeamProgress>, AppError> {
        let guard = self.progress.read().map_err(lock_error)?;
        Ok(guard.values().cloned().collect())
    }
}

#[async_trait]
impl TimerRepository for FileStore {
    async fn get(&self, team: &str) -> Result<Option<TimerState>, AppError> {
        let guard = self.timers.read().map_err(lock_error)?;
        Ok(guard.get(team).cloned())
    }

    async fn save(&self, state: &TimerState) -> Result<(), AppError> {
        let mut guard = self.timers.write().map_err(lock_error)?;
        guard.insert(state.team.clone(), state.clone());
        self.persist(TIMERS_FILE, &*guard)
    }
}

#[async_trait]
impl UserRepository for FileStore {
    async fn find(&self, username: &str) -> Result<Option<UserAccount>, AppError> {
        let guard = self.users.read().map_err(lock_error)?;
        Ok(guard.get(&username.to_lowercase()).cloned())
    }

    async fn all(&self) -> Result<Vec<UserAccount>, AppError> {
        let guard = self.users.read().map_err(lock_error)?;
        let mut accounts: Vec<UserAccount> = guard.values().cloned().collect();
        accounts.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(accounts)
    }

    async fn upsert(&self, account: &UserAccount) -> Result<(), AppError> {
        let mut guard = self.users.write().map_err(lock_error)?;
        guard.insert(account.username.to_lowercase(), account.clone());
        self.persist_users(&guard)
    }

    async fn remove(&self, username: &str) -> Result<bool, AppError> {
        let mut guard = self.users.write().map_err(lock_error)?;
        let removed = guard.remove(&username.to_lowercase()).is_some();
        if removed {
            self.persist_users(&guard)?;
        }
        Ok(removed)
    }
}

#[async_trait]
impl SessionRepository for FileStore {
    async fn get(&self, id: &str) -> Result<Option<AuthSession>, AppError> {
        let guard = self.sessions.read().map_err(lock_error)?;
        Ok(guard.get(id).cloned())
    }

    async fn insert(&self, session: &AuthSession) -> Result<(), AppError> {
        let mut guard = self.sessions.write().map_err(lock_error)?;
        guard.retain(|_, existing| {
            !existing.username.eq_ignore_ascii_case(&session.username)
        });
        guard.insert(session.id.clone(), session.clone());
        self.persist(SESSIONS_FILE, &*guard)
    }

    async fn remove(&self, id: &str) -> Result<(), AppError> {
        let mut guard = self.sessions.write().map_err(lock_error)?;
        if guard.remove(id).is_some() {
            self.persist(SESSIONS_FILE, &*guard)?;
        }
        Ok(())
    }

    async fn remove_for_user(&self, username: &str) -> Result<(), AppError> {
        let mut guard = self.sessions.write().map_err(lock_error)?;
        let before = guard.len();
        guard.retain(|_, existing| !existing.username.eq_ignore_ascii_case(username));
        if guard.len() != before {
            self.persist(SESSIONS_FILE, &*guard)?;
        }
        Ok(())
    }

    async fn remove_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let mut guard = self.sessions.write().map_err(lock_error)?;
        let before = guard.len();
        guard.retain(|_, session| session.is_valid(now));
        let removed = (before - guard.len()) as u64;
        if removed > 0 {
            self.persist(SESSIONS_FILE, &*guard)?;
        }
        Ok(removed)
    }
}
