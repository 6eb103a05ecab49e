use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::events::{EventHub, TeamEvent};
use crate::locks::TeamLocks;
use crate::models::{ManualTimer, TimerState, TimerStatus, elapsed_whole_seconds};
use crate::store::Storage;

/// Timer snapshot handed to clients: the persisted record plus the
/// live reading of a running stopwatch.
#[derive(Debug, Serialize, Deserialize)]
pub struct TimerReading {
    pub team: String,
    pub status: TimerStatus,
    pub accumulated_seconds: u64,
    pub elapsed_seconds: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub timer_started_at: Option<DateTime<Utc>>,
    pub challenge_seconds: BTreeMap<u32, u64>,
}

impl TimerReading {
    fn at(state: TimerState, now: DateTime<Utc>) -> Self {
        let live = match (state.manual.status, state.manual.started_at) {
            (TimerStatus::Running, Some(started_at)) => elapsed_whole_seconds(started_at, now),
            _ => 0,
        };
        TimerReading {
            team: state.team,
            status: state.manual.status,
            accumulated_seconds: state.manual.accumulated_seconds,
            elapsed_seconds: state.manual.accumulated_seconds + live,
            started_at: state.manual.started_at,
            timer_started_at: state.timer_started_at,
            challenge_seconds: state.challenge_seconds,
        }
    }
}

/// Manual stopwatch operations plus the bookkeeping for the automatic
/// challenge clock the approval flow drives.
#[derive(Clone)]
pub struct TimerService {
    storage: Storage,
    locks: TeamLocks,
    hub: EventHub,
}

impl TimerService {
    pub fn new(storage: Storage, locks: TeamLocks, hub: EventHub) -> Self {
        TimerService {
            storage,
            locks,
            hub,
        }
    }

    async fn load_or_fresh(&self, team: &str) -> Result<TimerState, AppError> {
        Ok(self
            .storage
            .timers
            .get(team)
            .await?
            .unwrap_or_else(|| TimerState::fresh(team)))
    }

    pub async fn read(&self, team: &str) -> Result<TimerReading, AppError> {
        let state = self.load_or_fresh(team).await?;
        Ok(TimerReading::at(state, Utc::now()))
    }

    #[instrument(skip(self))]
    pub async fn start(&self, team: &str) -> Result<TimerReading, AppError> {
        let _guard = self.locks.acquire(team).await;
        let mut state = self.load_or_fresh(team).await?;
        if state.manual.status == TimerStatus::Running {
            return Err(AppError::Conflict(
                "stopwatch is already running".to_string(),
            ));
        }
        let now = Utc::now();
        state.manual.status = TimerStatus::Running;
        state.manual.started_at = Some(now);
        self.storage.timers.save(&state).await?;
        info!(team = %team, "Stopwatch started");
        self.publish_stopwatch(&state);
        Ok(TimerReading::at(state, now))
    }

    #[instrument(skip(self))]
    pub async fn stop(&self, team: &str) -> Result<TimerReading, AppError> {
        let _guard = self.locks.acquire(team).await;
        let mut state = self.load_or_fresh(team).await?;
        if state.manual.status == TimerStatus::Stopped {
            return Err(AppError::Conflict(
                "stopwatch is already stopped".to_string(),
            ));
        }
        let now = Utc::now();
        if let Some(started_at) = state.manual.started_at {
            state.manual.accumulated_seconds += elapsed_whole_seconds(started_at, now);
        }
        state.manual.status = TimerStatus::Stopped;
        state.manual.started_at = None;
        self.storage.timers.save(&state).await?;
        info!(
            team = %team,
            accumulated_seconds = state.manual.accumulated_seconds,
            "Stopwatch stopped"
        );
        self.publish_stopwatch(&state);
        Ok(TimerReading::at(state, now))
    }

    #[instrument(skip(self))]
    pub async fn reset(&self, team: &str) -> Result<TimerReading, AppError> {
        let _guard = self.locks.acquire(team).await;
        let mut state = self.load_or_fresh(team).await?;
        state.manual = ManualTimer::default();
        self.storage.timers.save(&state).await?;
        info!(team = %team, "Stopwatch reset");
        self.publish_stopwatch(&state);
        Ok(TimerReading::at(state, Utc::now()))
    }

    fn publish_stopwatch(&self, state: &TimerState) {
        self.hub.publish(TeamEvent::Timer {
            team: state.team.clone(),
            status: state.manual.status,
            accumulated_seconds: state.manual.accumulated_seconds,
            running_since: state.manual.started_at,
        });
    }

    // Challenge-clock bookkeeping below runs inside the progress
    // operations; the caller already holds the team lock.

    pub(crate) async fn record_challenge(
        &self,
        team: &str,
        number: u32,
        is_last: bool,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let mut state = self.load_or_fresh(team).await?;
        let elapsed = state
            .timer_started_at
            .map(|anchor| elapsed_whole_seconds(anchor, now))
            .unwrap_or(0);
        state.challenge_seconds.insert(number, elapsed);
        state.timer_started_at = if is_last { None } else { Some(now) };
        self.storage.timers.save(&state).await
    }

    pub(crate) async fn clear_challenge(
        &self,
        team: &str,
        number: u32,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let mut state = self.load_or_fresh(team).await?;
        state.challenge_seconds.remove(&number);
        state.timer_started_at = Some(now);
        self.storage.timers.save(&state).await
    }

    pub(crate) async fn clear_all(&self, team: &str) -> Result<(), AppError> {
        let mut state = self.load_or_fresh(team).await?;
        state.challenge_seconds.clear();
        state.timer_started_at = None;
        self.storage.timers.save(&state).await
    }

    pub(crate) async fn ensure_anchor(
        &self,
        team: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let mut state = self.load_or_fresh(team).await?;
        if state.timer_started_at.is_none() {
            state.timer_started_at = Some(now);
            self.storage.timers.save(&state).await?;
        }
        Ok(())
    }
}
