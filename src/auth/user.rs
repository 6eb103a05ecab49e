use serde::{Deserialize, Serialize};

use crate::error::AppError;

use super::{Permission, Role};

/// A stored account. Passwords are kept only as bcrypt hashes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl UserAccount {
    /// Role and team must agree: participants and coaches belong to a
    /// team, techleads never do.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.username.trim().is_empty() {
            return Err(AppError::Validation("username must not be empty".to_string()));
        }
        if let Some(team) = &self.team {
            if team.trim().is_empty() {
                return Err(AppError::Validation(format!(
                    "user '{}' has an empty team name",
                    self.username
                )));
            }
        }
        match (self.role, &self.team) {
            (Role::Participant | Role::Coach, None) => Err(AppError::Validation(format!(
                "user '{}' has role '{}' but no team",
                self.username, self.role
            ))),
            (Role::Techlead, Some(_)) => Err(AppError::Validation(format!(
                "user '{}' is a techlead and must not have a team",
                self.username
            ))),
            _ => Ok(()),
        }
    }
}

/// The authenticated identity handlers receive via the request guard.
#[derive(Debug, Serialize, Clone)]
pub struct User {
    pub username: String,
    pub role: Role,
    pub team: Option<String>,
    pub display_name: Option<String>,
}

impl From<&UserAccount> for User {
    fn from(account: &UserAccount) -> Self {
        Self {
            username: account.username.clone(),
            role: account.role,
            team: account.team.clone(),
            display_name: account.display_name.clone(),
        }
    }
}

impl User {
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.role.has_permission(permission)
    }

    pub fn require_permission(&self, permission: Permission) -> Result<(), AppError> {
        if self.has_permission(permission) {
            Ok(())
        } else {
            tracing::warn!(
                username = %self.username,
                role = %self.role.as_str(),
                permission = ?permission,
                "Permission denied"
            );
            Err(AppError::Authorization(
                "insufficient permissions".to_string(),
            ))
        }
    }

    /// Techleads may act on any team; everyone else only on their own.
    pub fn require_team_access(&self, team: &str) -> Result<(), AppError> {
        if self.role == Role::Techlead || self.team.as_deref() == Some(team) {
            Ok(())
        } else {
            tracing::warn!(
                username = %self.username,
                role = %self.role.as_str(),
                team = %team,
                "Team access denied"
            );
            Err(AppError::Authorization("no access to this team".to_string()))
        }
    }
}
