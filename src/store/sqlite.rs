use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Pool, Sqlite, SqlitePool};
use tracing::info;

use crate::auth::{AuthSession, Role, UserAccount};
use crate::error::AppError;
use crate::models::{ManualTimer, TeamProgress, TimerState, TimerStatus};

use super::{ProgressRepository, SessionRepository, TimerRepository, UserRepository};

pub const CURRENT_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS team_progress (
    team TEXT PRIMARY KEY,
    current_step INTEGER NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS team_timers (
    team TEXT PRIMARY KEY,
    manual_status TEXT NOT NULL DEFAULT 'stopped',
    manual_started_at TEXT,
    accumulated_seconds INTEGER NOT NULL DEFAULT 0,
    timer_started_at TEXT
);

CREATE TABLE IF NOT EXISTS challenge_times (
    team TEXT NOT NULL,
    challenge_number INTEGER NOT NULL,
    seconds INTEGER NOT NULL,
    PRIMARY KEY (team, challenge_number)
);

CREATE TABLE IF NOT EXISTS users (
    username TEXT PRIMARY KEY COLLATE NOCASE,
    password_hash TEXT NOT NULL,
    role TEXT NOT NULL,
    team TEXT,
    display_name TEXT
);

CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    username TEXT NOT NULL COLLATE NOCASE,
    role TEXT NOT NULL,
    team TEXT,
    created_at TEXT NOT NULL,
    expires_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sessions_username ON sessions (username);
CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions (expires_at);
"#;

/// SQLite persistence behind the same repository traits as the file
/// store. The schema is applied idempotently on connect.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    pub async fn connect(url: &str) -> Result<Arc<Self>, AppError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;
        let store = Self::with_pool(pool).await?;
        info!(url = %url, "Connected to SQLite store");
        Ok(store)
    }

    pub async fn with_pool(pool: Pool<Sqlite>) -> Result<Arc<Self>, AppError> {
        sqlx::raw_sql(CURRENT_SCHEMA).execute(&pool).await?;
        Ok(Arc::new(SqliteStore { pool }))
    }
}

#[derive(sqlx::FromRow)]
struct ProgressRow {
    team: String,
    current_step: i64,
    updated_at: DateTime<Utc>,
}

impl From<ProgressRow> for TeamProgress {
    fn from(row: ProgressRow) -> Self {
        TeamProgress {
            team: row.team,
            current_step: u32::try_from(row.current_step).unwrap_or_default(),
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TimerRow {
    team: String,
    manual_status: String,
    manual_started_at: Option<DateTime<Utc>>,
    accumulated_seconds: i64,
    timer_started_at: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow)]
struct ChallengeTimeRow {
    challenge_number: i64,
    seconds: i64,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    username: String,
    password_hash: String,
    role: String,
    team: Option<String>,
    display_name: Option<String>,
}

impl TryFrom<UserRow> for UserAccount {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self, AppError> {
        let role = Role::from_str(&row.role)
            .map_err(|err| AppError::Storage(format!("bad role in users table: {}", err)))?;
        let account = UserAccount {
            username: row.username,
            password_hash: row.password_hash,
            role,
            team: row.team,
            display_name: row.display_name,
        };
        // Role/team coherence holds for every account a repository
        // returns, whichever backend is configured.
        account
            .validate()
            .map_err(|err| AppError::Storage(format!("bad account in users table: {}", err)))?;
        Ok(account)
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    username: String,
    role: String,
    team: Option<String>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl TryFrom<SessionRow> for AuthSession {
    type Error = AppError;

    fn try_from(row: SessionRow) -> Result<Self, AppError> {
        let role = Role::from_str(&row.role)
            .map_err(|err| AppError::Storage(format!("bad role in sessions table: {}", err)))?;
        Ok(AuthSession {
            id: row.id,
            username: row.username,
            role,
            team: row.team,
            created_at: row.created_at,
            expires_at: row.expires_at,
        })
    }
}

#[async_trait]
impl ProgressRepository for SqliteStore {
    async fn get(&self, team: &str) -> Result<Option<TeamProgress>, AppError> {
        let row = sqlx::query_as::<_, ProgressRow>(
            "SELECT team, current_step, updated_at FROM team_progress WHERE team = ?",
        )
        .bind(team)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(TeamProgress::from))
    }

    async fn save(&self, progress: &TeamProgress) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO team_progress (team, current_step, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(team) DO UPDATE SET
                 current_step = excluded.current_step,
                 updated_at = excluded.updated_at",
        )
        .bind(&progress.team)
        .bind(progress.current_step as i64)
        .bind(progress.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn all(&self) -> Result<Vec<TeamProgress>, AppError> {
        let rows = sqlx::query_as::<_, ProgressRow>(
            "SELECT team, current_step, updated_at FROM team_progress ORDER BY team",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(TeamProgress::from).collect())
    }
}

#[async_trait]
impl TimerRepository for SqliteStore {
    async fn get(&self, team: &str) -> Result<Option<TimerState>, AppError> {
        let row = sqlx::query_as::<_, TimerRow>(
            "SELECT team, manual_status, manual_started_at, accumulated_seconds, timer_started_at
             FROM team_timers WHERE team = ?",
        )
        .bind(team)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let times = sqlx::query_as::<_, ChallengeTimeRow>(
            "SELECT challenge_number, seconds FROM challenge_times
             WHERE team = ? ORDER BY challenge_number",
        )
        .bind(team)
        .fetch_all(&self.pool)
        .await?;

        let mut challenge_seconds = BTreeMap::new();
        for time in times {
            challenge_seconds.insert(
                u32::try_from(time.challenge_number).unwrap_or_default(),
                time.seconds.max(0) as u64,
            );
        }

        Ok(Some(TimerState {
            team: row.team,
            manual: ManualTimer {
                status: TimerStatus::parse(&row.manual_status).unwrap_or(TimerStatus::Stopped),
                started_at: row.manual_started_at,
                accumulated_seconds: row.accumulated_seconds.max(0) as u64,
            },
            timer_started_at: row.timer_started_at,
            challenge_seconds,
        }))
    }

    async fn save(&self, state: &TimerState) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO team_timers
                 (team, manual_status, manual_started_at, accumulated_seconds, timer_started_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(team) DO UPDATE SET
                 manual_status = excluded.manual_status,
                 manual_started_at = excluded.manual_started_at,
                 accumulated_seconds = excluded.accumulated_seconds,
                 timer_started_at = excluded.timer_started_at",
        )
        .bind(&state.team)
        .bind(state.manual.status.as_str())
        .bind(state.manual.started_at)
        .bind(state.manual.accumulated_seconds as i64)
        .bind(state.timer_started_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM challenge_times WHERE team = ?")
            .bind(&state.team)
            .execute(&mut *tx)
            .await?;

        for (number, seconds) in &state.challenge_seconds {
            sqlx::query(
                "INSERT INTO challenge_times (team, challenge_number, seconds) VALUES (?, ?, ?)",
            )
            .bind(&state.team)
            .bind(*number as i64)
            .bind(*seconds as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl UserRepository for SqliteStore {
    async fn find(&self, username: &str) -> Result<Option<UserAccount>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT username, password_hash, role, team, display_name
             FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        row.map(UserAccount::try_from).transpose()
    }

    async fn all(&self) -> Result<Vec<UserAccount>, AppError> {
        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT username, password_hash, role, team, display_name
             FROM users ORDER BY username",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(UserAccount::try_from).collect()
    }

    async fn upsert(&self, account: &UserAccount) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO users (username, password_hash, role, team, display_name)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(username) DO UPDATE SET
                 username = excluded.username,
                 password_hash = excluded.password_hash,
                 role = excluded.role,
                 team = excluded.team,
                 display_name = excluded.display_name",
        )
        .bind(&account.username)
        .bind(&account.password_hash)
        .bind(account.role.as_str())
        .bind(&account.team)
        .bind(&account.display_name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove(&self, username: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM users WHERE username = ?")
            .bind(username)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl SessionRepository for SqliteStore {
    async fn get(&self, id: &str) -> Result<Option<AuthSession>, AppError> {
        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT id, username, role, team, created_at, expires_at
             FROM sessions WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(AuthSession::try_from).transpose()
    }

    async fn insert(&self, session: &AuthSession) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM sessions WHERE username = ?")
            .bind(&session.username)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO sessions (id, username, role, team, created_at, expires_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&session.id)
        .bind(&session.username)
        .bind(session.role.as_str())
        .bind(&session.team)
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn remove_for_user(&self, username: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM sessions WHERE username = ?")
            .bind(username)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn remove_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM sessions WHERE datetime(expires_at) <= datetime(?)")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
