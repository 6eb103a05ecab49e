#[macro_use]
extern crate rocket;

mod api;
mod auth;
mod challenges;
mod config;
mod env;
mod error;
mod events;
mod locks;
mod models;
mod progress;
mod store;
mod telemetry;
#[cfg(test)]
mod test;
mod timer;
mod validation;

use std::sync::Arc;

use api::{
    api_approve, api_create_user, api_delete_user, api_health, api_list_users, api_login,
    api_logout, api_me, api_reset, api_revert, api_team_challenges, api_team_events,
    api_team_progress, api_teams, api_timer, api_timer_reset, api_timer_start, api_timer_stop,
    api_update_user,
};
use auth::{bad_request, forbidden, internal_error, not_found, unauthorized, unprocessable};
use challenges::ChallengeSet;
use config::PortalConfig;
use env::load_environment;
use events::EventHub;
use locks::TeamLocks;
use progress::ChallengeService;
use rocket::fairing::AdHoc;
use rocket::{Build, Rocket, tokio};
use store::Storage;
use telemetry::TelemetryFairing;
use telemetry::{init_tracing, shutdown_telemetry};
use timer::TimerService;
use tracing::{error, info};

#[launch]
async fn rocket() -> _ {
    // Environment files feed both the config and the tracing setup, so
    // they are loaded before the subscriber exists.
    if let Err(e) = load_environment() {
        eprintln!("Failed to load environment files: {}", e);
    }

    init_tracing();

    let config = PortalConfig::from_env().expect("Invalid portal configuration");

    let challenges =
        Arc::new(ChallengeSet::load(&config.challenge_dir).expect("Failed to load challenges"));

    let storage = Storage::from_config(&config)
        .await
        .expect("Failed to open storage backend");

    let sweeper = storage.clone();

    tokio::spawn(async move {
        tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;

        loop {
            match sweeper.sessions.remove_expired(chrono::Utc::now()).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Cleaned up {} expired sessions", count);
                    }
                }
                Err(e) => {
                    error!("Failed to clean expired sessions: {}", e);
                }
            }

            tokio::time::sleep(tokio::time::Duration::from_secs(3600)).await;
        }
    });

    init_rocket(config, storage, challenges).await
}

pub async fn init_rocket(
    config: PortalConfig,
    storage: Storage,
    challenges: Arc<ChallengeSet>,
) -> Rocket<Build> {
    info!(
        "Starting microhack portal with {} challenges",
        challenges.total()
    );

    let locks = TeamLocks::new();
    let hub = EventHub::new();
    let timers = TimerService::new(storage.clone(), locks.clone(), hub.clone());
    let service = ChallengeService::new(
        storage.clone(),
        challenges,
        timers.clone(),
        locks,
        hub.clone(),
    );

    rocket::build()
        .manage(config)
        .manage(storage)
        .manage(hub)
        .manage(timers)
        .manage(service)
        .mount(
            "/api",
            routes![
                api_login,
                api_logout,
                api_me,
                api_health,
                api_team_challenges,
                api_team_progress,
                api_approve,
                api_revert,
                api_reset,
                api_timer,
                api_timer_start,
                api_timer_stop,
                api_timer_reset,
                api_team_events,
                api_teams,
                api_list_users,
                api_create_user,
                api_update_user,
                api_delete_user,
            ],
        )
        .register(
            "/",
            catchers![
                bad_request,
                unauthorized,
                forbidden,
                not_found,
                unprocessable,
                internal_error
            ],
        )
        .attach(TelemetryFairing)
        .attach(AdHoc::on_shutdown("Flush telemetry", |_| {
            Box::pin(async {
                shutdown_telemetry();
            })
        }))
}
