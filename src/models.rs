use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a team currently stands in the challenge sequence.
///
/// `current_step` walks from 1 to `total + 1`; a step past the last
/// challenge means the team has finished the event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamProgress {
    pub team: String,
    pub current_step: u32,
    pub updated_at: DateTime<Utc>,
}

impl TeamProgress {
    pub fn fresh(team: &str, total_challenges: usize) -> Self {
        TeamProgress {
            team: team.to_string(),
            current_step: if total_challenges == 0 { 0 } else { 1 },
            updated_at: Utc::now(),
        }
    }

    pub fn is_completed(&self, total_challenges: usize) -> bool {
        self.current_step as usize > total_challenges
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    Running,
    Stopped,
}

impl TimerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerStatus::Running => "running",
            TimerStatus::Stopped => "stopped",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(TimerStatus::Running),
            "stopped" => Some(TimerStatus::Stopped),
            _ => None,
        }
    }
}

/// The hand-operated stopwatch. Wholly independent of the automatic
/// per-challenge clock; they only share a persistence record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualTimer {
    pub status: TimerStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub accumulated_seconds: u64,
}

impl Default for ManualTimer {
    fn default() -> Self {
        ManualTimer {
            status: TimerStatus::Stopped,
            started_at: None,
            accumulated_seconds: 0,
        }
    }
}

/// Per-team timing record: the manual stopwatch plus the automatic
/// clock the approval flow drives. `timer_started_at` anchors the
/// challenge currently being worked on and `challenge_seconds` holds
/// the recorded duration of each approved challenge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerState {
    pub team: String,
    #[serde(default)]
    pub manual: ManualTimer,
    pub timer_started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub challenge_seconds: BTreeMap<u32, u64>,
}

impl TimerState {
    pub fn fresh(team: &str) -> Self {
        TimerState {
            team: team.to_string(),
            manual: ManualTimer::default(),
            timer_started_at: None,
            challenge_seconds: BTreeMap::new(),
        }
    }
}

/// Whole seconds between `from` and `to`, clamped so a clock step
/// backwards never yields a negative duration.
pub fn elapsed_whole_seconds(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    (to - from).num_seconds().max(0) as u64
}
