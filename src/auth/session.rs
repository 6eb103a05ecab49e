use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::Role;
use super::user::UserAccount;

/// Name of the private cookie carrying the session id.
pub const SESSION_COOKIE: &str = "microhack_session";

/// A live login. At most one per username; a new login displaces the
/// previous session for that user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub id: String,
    pub username: String,
    pub role: Role,
    pub team: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AuthSession {
    pub fn issue(account: &UserAccount, ttl: Duration) -> Self {
        let now = Utc::now();
        AuthSession {
            id: generate_session_id(),
            username: account.username.clone(),
            role: account.role,
            team: account.team.clone(),
            created_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// 32 lowercase hex characters from 16 random bytes.
pub fn generate_session_id() -> String {
    let bytes: [u8; 16] = rand::random();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
