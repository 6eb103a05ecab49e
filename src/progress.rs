use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::challenges::ChallengeSet;
use crate::error::AppError;
use crate::events::{EventHub, TeamEvent};
use crate::locks::TeamLocks;
use crate::models::TeamProgress;
use crate::store::Storage;
use crate::timer::TimerService;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeStatus {
    Locked,
    Current,
    Complete,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub team: String,
    pub current_step: u32,
    pub total_challenges: usize,
    pub completed: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

/// One challenge as a given team sees it. Markdown is withheld while
/// the challenge is still locked.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChallengeView {
    pub number: u32,
    pub title: String,
    pub status: ChallengeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TeamBoard {
    pub progress: ProgressSnapshot,
    pub challenges: Vec<ChallengeView>,
}

/// The progression state machine. Approve, revert and reset for one
/// team are serialized through the per-team lock; every change is
/// persisted and then announced on the event hub.
#[derive(Clone)]
pub struct ChallengeService {
    storage: Storage,
    challenges: Arc<ChallengeSet>,
    timers: TimerService,
    locks: TeamLocks,
    hub: EventHub,
}

impl ChallengeService {
    pub fn new(
        storage: Storage,
        challenges: Arc<ChallengeSet>,
        timers: TimerService,
        locks: TeamLocks,
        hub: EventHub,
    ) -> Self {
        ChallengeService {
            storage,
            challenges,
            timers,
            locks,
            hub,
        }
    }

    fn snapshot(&self, progress: &TeamProgress) -> ProgressSnapshot {
        let total = self.challenges.total();
        ProgressSnapshot {
            team: progress.team.clone(),
            current_step: progress.current_step,
            total_challenges: total,
            completed: progress.is_completed(total),
            updated_at: Some(progress.updated_at),
        }
    }

    async fn load_or_create(&self, team: &str) -> Result<TeamProgress, AppError> {
        match self.storage.progress.get(team).await? {
            Some(progress) => Ok(progress),
            None => {
                let progress = TeamProgress::fresh(team, self.challenges.total());
                self.storage.progress.save(&progress).await?;
                info!(team = %team, step = progress.current_step, "Created progress record");
                Ok(progress)
            }
        }
    }

    // Reading progress for a team still in flight also makes sure the
    // challenge clock is anchored, so challenge 1 starts counting from
    // the team's first visit.
    async fn load_and_anchor(&self, team: &str) -> Result<TeamProgress, AppError> {
        let progress = self.load_or_create(team).await?;
        if !self.challenges.is_empty() && !progress.is_completed(self.challenges.total()) {
            self.timers.ensure_anchor(team, Utc::now()).await?;
        }
        Ok(progress)
    }

    #[instrument(skip(self))]
    pub async fn progress(&self, team: &str) -> Result<ProgressSnapshot, AppError> {
        let _guard = self.locks.acquire(team).await;
        let progress = self.load_and_anchor(team).await?;
        Ok(self.snapshot(&progress))
    }

    /// Every challenge with its lock state for this team.
    #[instrument(skip(self))]
    pub async fn board(&self, team: &str) -> Result<TeamBoard, AppError> {
        let _guard = self.locks.acquire(team).await;
        let progress = self.load_and_anchor(team).await?;
        let step = progress.current_step;
        let challenges = self
            .challenges
            .iter()
            .map(|challenge| {
                let status = if challenge.number < step {
                    ChallengeStatus::Complete
                } else if challenge.number == step {
                    ChallengeStatus::Current
                } else {
                    ChallengeStatus::Locked
                };
                ChallengeView {
                    number: challenge.number,
                    title: challenge.title.clone(),
                    status,
                    markdown: match status {
                        ChallengeStatus::Locked => None,
                        _ => Some(challenge.markdown.clone()),
                    },
                }
            })
            .collect();
        Ok(TeamBoard {
            progress: self.snapshot(&progress),
            challenges,
        })
    }

    #[instrument(skip(self))]
    pub async fn approve(&self, team: &str) -> Result<ProgressSnapshot, AppError> {
        let _guard = self.locks.acquire(team).await;
        let total = self.challenges.total();
        if total == 0 {
            return Err(AppError::Conflict("no challenges are loaded".to_string()));
        }
        let mut progress = self.load_or_create(team).await?;
        if progress.is_completed(total) {
            return Err(AppError::Conflict(
                "all challenges are already completed".to_string(),
            ));
        }

        let now = Utc::now();
        let approved = progress.current_step;
        let is_last = approved as usize == total;
        self.timers
            .record_challenge(team, approved, is_last, now)
            .await?;

        progress.current_step += 1;
        progress.updated_at = now;
        self.storage.progress.save(&progress).await?;
        info!(
            team = %team,
            challenge = approved,
            step = progress.current_step,
            "Challenge approved"
        );

        let snapshot = self.snapshot(&progress);
        self.publish(&snapshot);
        Ok(snapshot)
    }

    #[instrument(skip(self))]
    pub async fn revert(&self, team: &str) -> Result<ProgressSnapshot, AppError> {
        let _guard = self.locks.acquire(team).await;
        let mut progress = self.load_or_create(team).await?;
        if progress.current_step <= 1 {
            return Err(AppError::Conflict(
                "already at the first challenge".to_string(),
            ));
        }

        let now = Utc::now();
        progress.current_step -= 1;
        progress.updated_at = now;
        // The re-entered challenge loses its recorded time and starts
        // counting again from now.
        self.timers
            .clear_challenge(team, progress.current_step, now)
            .await?;
        self.storage.progress.save(&progress).await?;
        info!(team = %team, step = progress.current_step, "Progress reverted");

        let snapshot = self.snapshot(&progress);
        self.publish(&snapshot);
        Ok(snapshot)
    }

    #[instrument(skip(self))]
    pub async fn reset(&self, team: &str) -> Result<ProgressSnapshot, AppError> {
        let _guard = self.locks.acquire(team).await;
        if self.challenges.is_empty() {
            return Err(AppError::Conflict("no challenges are loaded".to_string()));
        }
        let mut progress = self.load_or_create(team).await?;
        progress.current_step = 1;
        progress.updated_at = Utc::now();
        self.timers.clear_all(team).await?;
        self.storage.progress.save(&progress).await?;
        info!(team = %team, "Progress reset");

        let snapshot = self.snapshot(&progress);
        self.publish(&snapshot);
        Ok(snapshot)
    }

    /// Snapshot of every known team, for the monitoring view. Teams
    /// that exist only as user assignments show up untouched.
    #[instrument(skip(self))]
    pub async fn all_teams(&self) -> Result<Vec<ProgressSnapshot>, AppError> {
        let mut snapshots: BTreeMap<String, ProgressSnapshot> = BTreeMap::new();
        for progress in self.storage.progress.all().await? {
            snapshots.insert(progress.team.clone(), self.snapshot(&progress));
        }
        for account in self.storage.users.all().await? {
            if let Some(team) = account.team {
                let fresh = TeamProgress::fresh(&team, self.challenges.total());
                snapshots.entry(team).or_insert_with(|| ProgressSnapshot {
                    team: fresh.team.clone(),
                    current_step: fresh.current_step,
                    total_challenges: self.challenges.total(),
                    completed: false,
                    updated_at: None,
                });
            }
        }
        Ok(snapshots.into_values().collect())
    }

    fn publish(&self, snapshot: &ProgressSnapshot) {
        self.hub.publish(TeamEvent::Progress {
            team: snapshot.team.clone(),
            current_step: snapshot.current_step,
            total_challenges: snapshot.total_challenges,
            completed: snapshot.completed,
        });
    }
}
