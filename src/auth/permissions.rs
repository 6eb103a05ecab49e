use anyhow::Error;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ViewChallenges,
    ViewProgress,
    ViewTimer,
    ControlTimer,

    ApproveProgress,
    RevertProgress,
    ResetProgress,
    ResetTimer,

    ViewAllTeams,
    ManageUsers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Participant,
    Coach,
    Techlead,
}

static PARTICIPANT_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.insert(Permission::ViewChallenges);
    permissions.insert(Permission::ViewProgress);
    permissions.insert(Permission::ViewTimer);
    permissions.insert(Permission::ControlTimer);

    permissions
});

static COACH_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.extend(PARTICIPANT_PERMISSIONS.iter().copied());

    permissions.insert(Permission::ApproveProgress);
    permissions.insert(Permission::RevertProgress);
    permissions.insert(Permission::ResetProgress);
    permissions.insert(Permission::ResetTimer);

    permissions
});

static TECHLEAD_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.extend(COACH_PERMISSIONS.iter().copied());

    permissions.insert(Permission::ViewAllTeams);
    permissions.insert(Permission::ManageUsers);

    permissions
});

impl Role {
    pub fn permissions(&self) -> &'static HashSet<Permission> {
        match self {
            Role::Participant => &PARTICIPANT_PERMISSIONS,
            Role::Coach => &COACH_PERMISSIONS,
            Role::Techlead => &TECHLEAD_PERMISSIONS,
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Participant => "participant",
            Role::Coach => "coach",
            Role::Techlead => "techlead",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "participant" => Ok(Role::Participant),
            "coach" => Ok(Role::Coach),
            "techlead" => Ok(Role::Techlead),
            _ => Err(Error::msg(format!("Unknown role: {}", s))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
