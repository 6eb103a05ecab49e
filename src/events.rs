use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::models::TimerStatus;

const CHANNEL_CAPACITY: usize = 32;

/// Events fanned out to clients watching one team.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TeamEvent {
    Progress {
        team: String,
        current_step: u32,
        total_challenges: usize,
        completed: bool,
    },
    Timer {
        team: String,
        status: TimerStatus,
        accumulated_seconds: u64,
        running_since: Option<DateTime<Utc>>,
    },
}

impl TeamEvent {
    pub fn team(&self) -> &str {
        match self {
            TeamEvent::Progress { team, .. } | TeamEvent::Timer { team, .. } => team,
        }
    }
}

/// Broadcast hub keyed by team name. A channel is created on first
/// subscription; publishing to a team nobody watches is a no-op.
#[derive(Clone, Default)]
pub struct EventHub {
    channels: Arc<DashMap<String, broadcast::Sender<TeamEvent>>>,
}

impl EventHub {
    pub fn new() -> Self {
        EventHub::default()
    }

    pub fn subscribe(&self, team: &str) -> broadcast::Receiver<TeamEvent> {
        self.channels
            .entry(team.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    pub fn publish(&self, event: TeamEvent) {
        let sender = self.channels.get(event.team()).map(|entry| entry.clone());
        if let Some(sender) = sender {
            // A send error only means every receiver has gone away.
            let _ = sender.send(event);
        }
    }
}
