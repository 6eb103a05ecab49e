use chrono::Utc;
use rocket::Request;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use tracing::Instrument;

use crate::error::ErrorBody;
use crate::store::Storage;

use super::User;
use super::session::SESSION_COOKIE;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for User {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let auth_span = tracing::info_span!("user_auth_guard");
        async move {
            let token = request
                .cookies()
                .get_private(SESSION_COOKIE)
                .map(|c| c.value().to_string());

            let Some(token) = token else {
                return Outcome::Error((Status::Unauthorized, ()));
            };

            let storage = match request.rocket().state::<Storage>() {
                Some(storage) => storage,
                None => {
                    tracing::error!("Storage not found in managed state");
                    return Outcome::Error((Status::InternalServerError, ()));
                }
            };

            let session = match storage.sessions.get(&token).await {
                Ok(Some(session)) => session,
                Ok(None) => {
                    tracing::warn!("Unknown session token");
                    return Outcome::Error((Status::Unauthorized, ()));
                }
                Err(err) => {
                    tracing::error!(error = ?err, "Failed to look up session");
                    return Outcome::Error((Status::InternalServerError, ()));
                }
            };

            if !session.is_valid(Utc::now()) {
                tracing::warn!(username = %session.username, "Session expired");
                return Outcome::Error((Status::Unauthorized, ()));
            }

            match storage.users.find(&session.username).await {
                Ok(Some(account)) => {
                    tracing::info!(
                        username = %account.username,
                        role = %account.role.as_str(),
                        "User authenticated via session cookie"
                    );
                    Outcome::Success(User::from(&account))
                }
                Ok(None) => {
                    tracing::warn!(username = %session.username, "Session refers to a deleted user");
                    Outcome::Error((Status::Unauthorized, ()))
                }
                Err(err) => {
                    tracing::error!(error = ?err, "Failed to fetch user for valid session");
                    Outcome::Error((Status::InternalServerError, ()))
                }
            }
        }
        .instrument(auth_span)
        .await
    }
}

#[catch(401)]
pub fn unauthorized(_req: &Request) -> Custom<Json<ErrorBody>> {
    Custom(
        Status::Unauthorized,
        Json(ErrorBody {
            error: "authentication required".to_string(),
        }),
    )
}

#[catch(403)]
pub fn forbidden(_req: &Request) -> Custom<Json<ErrorBody>> {
    Custom(
        Status::Forbidden,
        Json(ErrorBody {
            error: "insufficient permissions".to_string(),
        }),
    )
}

#[catch(404)]
pub fn not_found(_req: &Request) -> Custom<Json<ErrorBody>> {
    Custom(
        Status::NotFound,
        Json(ErrorBody {
            error: "resource not found".to_string(),
        }),
    )
}

// Syntactically invalid JSON never reaches deserialization; Rocket
// rejects it as a plain 400.
#[catch(400)]
pub fn bad_request(_req: &Request) -> Custom<Json<ErrorBody>> {
    Custom(
        Status::BadRequest,
        Json(ErrorBody {
            error: "malformed request body".to_string(),
        }),
    )
}

// Rocket reports body deserialization failures as 422; the API
// contract treats those as plain validation errors.
#[catch(422)]
pub fn unprocessable(_req: &Request) -> Custom<Json<ErrorBody>> {
    Custom(
        Status::BadRequest,
        Json(ErrorBody {
            error: "malformed request body".to_string(),
        }),
    )
}

#[catch(500)]
pub fn internal_error(_req: &Request) -> Custom<Json<ErrorBody>> {
    Custom(
        Status::InternalServerError,
        Json(ErrorBody {
            error: "internal server error".to_string(),
        }),
    )
}
