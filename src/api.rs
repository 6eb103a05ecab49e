use rocket::Shutdown;
use rocket::State;
use rocket::http::{Cookie, CookieJar, SameSite, Status};
use rocket::response::status::Custom;
use rocket::response::stream::{Event, EventStream};
use rocket::serde::json::Json;
use rocket::tokio::select;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tracing::info;
use validator::Validate;

use crate::auth::{AuthSession, Permission, Role, SESSION_COOKIE, User, UserAccount};
use crate::config::PortalConfig;
use crate::error::AppError;
use crate::events::EventHub;
use crate::progress::{ChallengeService, ProgressSnapshot, TeamBoard};
use crate::store::Storage;
use crate::timer::{TimerReading, TimerService};

#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "username is required"))]
    username: String,
    #[validate(length(min = 1, message = "password is required"))]
    password: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct UserData {
    pub username: String,
    pub display_name: Option<String>,
    pub role: String,
    pub team: Option<String>,
}

impl From<&UserAccount> for UserData {
    fn from(account: &UserAccount) -> Self {
        Self {
            username: account.username.clone(),
            display_name: account.display_name.clone(),
            role: account.role.to_string(),
            team: account.team.clone(),
        }
    }
}

impl From<&User> for UserData {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            display_name: user.display_name.clone(),
            role: user.role.to_string(),
            team: user.team.clone(),
        }
    }
}

#[post("/login", data = "<login>")]
pub async fn api_login(
    login: Json<LoginRequest>,
    cookies: &CookieJar<'_>,
    storage: &State<Storage>,
    config: &State<PortalConfig>,
) -> Result<Json<UserData>, AppError> {
    let login = login.into_inner();
    login.validate()?;

    let Some(account) = storage.users.find(&login.username).await? else {
        return Err(AppError::Authentication(
            "invalid username or password".to_string(),
        ));
    };
    if !bcrypt::verify(&login.password, &account.password_hash)? {
        return Err(AppError::Authentication(
            "invalid username or password".to_string(),
        ));
    }

    let session = AuthSession::issue(&account, config.session_ttl());
    storage.sessions.insert(&session).await?;

    cookies.add_private(
        Cookie::build((SESSION_COOKIE, session.id.clone()))
            .same_site(SameSite::Strict)
            .http_only(true)
            .max_age(rocket::time::Duration::hours(config.session_hours)),
    );

    info!(username = %account.username, role = %account.role.as_str(), "User logged in");
    Ok(Json(UserData::from(&account)))
}

#[post("/logout")]
pub async fn api_logout(
    cookies: &CookieJar<'_>,
    storage: &State<Storage>,
) -> Result<Status, AppError> {
    if let Some(cookie) = cookies.get_private(SESSION_COOKIE) {
        storage.sessions.remove(cookie.value()).await?;
        cookies.remove_private(Cookie::build(SESSION_COOKIE));
    }
    Ok(Status::NoContent)
}

#[get("/me")]
pub async fn api_me(user: User) -> Json<UserData> {
    Json(UserData::from(&user))
}

#[get("/health")]
pub fn api_health() -> &'static str {
    "OK"
}

#[get("/team/<team>/challenges")]
pub async fn api_team_challenges(
    team: &str,
    user: User,
    service: &State<ChallengeService>,
) -> Result<Json<TeamBoard>, AppError> {
    user.require_permission(Permission::ViewChallenges)?;
    user.require_team_access(team)?;
    Ok(Json(service.board(team).await?))
}

#[get("/team/<team>/progress")]
pub async fn api_team_progress(
    team: &str,
    user: User,
    service: &State<ChallengeService>,
) -> Result<Json<ProgressSnapshot>, AppError> {
    user.require_permission(Permission::ViewProgress)?;
    user.require_team_access(team)?;
    Ok(Json(service.progress(team).await?))
}

#[post("/team/<team>/progress/approve")]
pub async fn api_approve(
    team: &str,
    user: User,
    service: &State<ChallengeService>,
) -> Result<Json<ProgressSnapshot>, AppError> {
    user.require_permission(Permission::ApproveProgress)?;
    user.require_team_access(team)?;
    Ok(Json(service.approve(team).await?))
}

#[post("/team/<team>/progress/revert")]
pub async fn api_revert(
    team: &str,
    user: User,
    service: &State<ChallengeService>,
) -> Result<Json<ProgressSnapshot>, AppError> {
    user.require_permission(Permission::RevertProgress)?;
    user.require_team_access(team)?;
    Ok(Json(service.revert(team).await?))
}

#[post("/team/<team>/progress/reset")]
pub async fn api_reset(
    team: &str,
    user: User,
    service: &State<ChallengeService>,
) -> Result<Json<ProgressSnapshot>, AppError> {
    user.require_permission(Permission::ResetProgress)?;
    user.require_team_access(team)?;
    Ok(Json(service.reset(team).await?))
}

#[get("/team/<team>/timer")]
pub async fn api_timer(
    team: &str,
    user: User,
    timers: &State<TimerService>,
) -> Result<Json<TimerReading>, AppError> {
    user.require_permission(Permission::ViewTimer)?;
    user.require_team_access(team)?;
    Ok(Json(timers.read(team).await?))
}

#[post("/team/<team>/timer/start")]
pub async fn api_timer_start(
    team: &str,
    user: User,
    timers: &State<TimerService>,
) -> Result<Json<TimerReading>, AppError> {
    user.require_permission(Permission::ControlTimer)?;
    user.require_team_access(team)?;
    Ok(Json(timers.start(team).await?))
}

#[post("/team/<team>/timer/stop")]
pub async fn api_timer_stop(
    team: &str,
    user: User,
    timers: &State<TimerService>,
) -> Result<Json<TimerReading>, AppError> {
    user.require_permission(Permission::ControlTimer)?;
    user.require_team_access(team)?;
    Ok(Json(timers.stop(team).await?))
}

#[post("/team/<team>/timer/reset")]
pub async fn api_timer_reset(
    team: &str,
    user: User,
    timers: &State<TimerService>,
) -> Result<Json<TimerReading>, AppError> {
    user.require_permission(Permission::ResetTimer)?;
    user.require_team_access(team)?;
    Ok(Json(timers.reset(team).await?))
}

/// Server-sent events for one team. The subscription outlives the
/// request handler and closes on server shutdown.
#[get("/events/<team>")]
pub async fn api_team_events(
    team: &str,
    user: User,
    hub: &State<EventHub>,
    mut end: Shutdown,
) -> Result<EventStream![], AppError> {
    user.require_permission(Permission::ViewProgress)?;
    user.require_team_access(team)?;

    let mut rx = hub.subscribe(team);
    Ok(EventStream! {
        loop {
            let event = select! {
                event = rx.recv() => match event {
                    Ok(event) => event,
                    Err(RecvError::Closed) => break,
                    Err(RecvError::Lagged(_)) => continue,
                },
                _ = &mut end => break,
            };
            yield Event::json(&event);
        }
    })
}

#[get("/teams")]
pub async fn api_teams(
    user: User,
    service: &State<ChallengeService>,
) -> Result<Json<Vec<ProgressSnapshot>>, AppError> {
    user.require_permission(Permission::ViewAllTeams)?;
    Ok(Json(service.all_teams().await?))
}

#[derive(Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, message = "username is required"))]
    username: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    password: String,
    #[validate(length(min = 1, message = "role is required"))]
    role: String,
    team: Option<String>,
    display_name: Option<String>,
}

#[derive(Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    password: Option<String>,
    role: Option<String>,
    team: Option<String>,
    display_name: Option<String>,
}

#[get("/admin/users")]
pub async fn api_list_users(
    user: User,
    storage: &State<Storage>,
) -> Result<Json<Vec<UserData>>, AppError> {
    user.require_permission(Permission::ManageUsers)?;
    let accounts = storage.users.all().await?;
    Ok(Json(accounts.iter().map(UserData::from).collect()))
}

#[post("/admin/users", data = "<request>")]
pub async fn api_create_user(
    request: Json<CreateUserRequest>,
    user: User,
    storage: &State<Storage>,
) -> Result<Custom<Json<UserData>>, AppError> {
    user.require_permission(Permission::ManageUsers)?;
    let request = request.into_inner();
    request.validate()?;

    let role = Role::from_str(&request.role)
        .map_err(|_| AppError::Validation(format!("unknown role '{}'", request.role)))?;

    if storage.users.find(&request.username).await?.is_some() {
        return Err(AppError::Conflict("username already exists".to_string()));
    }

    let account = UserAccount {
        username: request.username,
        password_hash: bcrypt::hash(&request.password, bcrypt::DEFAULT_COST)?,
        role,
        team: request.team,
        display_name: request.display_name,
    };
    account.validate()?;
    storage.users.upsert(&account).await?;

    info!(username = %account.username, role = %account.role.as_str(), "User created");
    Ok(Custom(Status::Created, Json(UserData::from(&account))))
}

#[put("/admin/users/<username>", data = "<request>")]
pub async fn api_update_user(
    username: &str,
    request: Json<UpdateUserRequest>,
    user: User,
    storage: &State<Storage>,
) -> Result<Json<UserData>, AppError> {
    user.require_permission(Permission::ManageUsers)?;
    let request = request.into_inner();
    request.validate()?;

    let mut account = storage
        .users
        .find(username)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("no user named '{}'", username)))?;

    if let Some(password) = &request.password {
        account.password_hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;
    }
    if let Some(role) = &request.role {
        account.role = Role::from_str(role)
            .map_err(|_| AppError::Validation(format!("unknown role '{}'", role)))?;
    }
    if let Some(team) = &request.team {
        account.team = Some(team.clone());
    }
    if account.role == Role::Techlead {
        account.team = None;
    }
    if let Some(display_name) = &request.display_name {
        account.display_name = Some(display_name.clone());
    }

    account.validate()?;
    storage.users.upsert(&account).await?;

    info!(username = %account.username, "User updated");
    Ok(Json(UserData::from(&account)))
}

#[delete("/admin/users/<username>")]
pub async fn api_delete_user(
    username: &str,
    user: User,
    storage: &State<Storage>,
) -> Result<Status, AppError> {
    user.require_permission(Permission::ManageUsers)?;
    if user.username.eq_ignore_ascii_case(username) {
        return Err(AppError::Conflict(
            "cannot delete your own account".to_string(),
        ));
    }

    if !storage.users.remove(username).await? {
        return Err(AppError::NotFound(format!("no user named '{}'", username)));
    }
    storage.sessions.remove_for_user(username).await?;

    info!(username = %username, "User deleted");
    Ok(Status::NoContent)
}
