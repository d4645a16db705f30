//! Roles and the capabilities they imply.
//!
//! Every account carries exactly one role. Admins and scrum masters are
//! approvers; only admins manage accounts.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The role attached to an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Platform administrator.
    Admin,
    /// Scrum master; approves mentor requests.
    ScrumMaster,
    /// Intern.
    Intern,
}

impl Role {
    /// All roles, in display order.
    pub const ALL: [Role; 3] = [Role::Admin, Role::ScrumMaster, Role::Intern];

    /// Returns true if this role may approve or reject mentor requests.
    #[must_use]
    pub fn is_approver(&self) -> bool {
        matches!(self, Self::Admin | Self::ScrumMaster)
    }

    /// Returns true if this role has admin privileges.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }

    /// Returns true if this role may ask another user to be their mentor.
    #[must_use]
    pub fn can_request_mentor(&self) -> bool {
        matches!(self, Self::Intern | Self::ScrumMaster)
    }

    /// The wire form used by the backing API.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::ScrumMaster => "scrum_master",
            Self::Intern => "intern",
        }
    }

    /// Upper-cased form sent on self-registration.
    #[must_use]
    pub fn as_upper(&self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::ScrumMaster => "SCRUM_MASTER",
            Self::Intern => "INTERN",
        }
    }

    /// The landing route for this role.
    #[must_use]
    pub fn landing_path(&self) -> &'static str {
        match self {
            Self::Admin => "/admin",
            Self::ScrumMaster => "/scrum-master",
            Self::Intern => "/intern",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    /// Parses a role name case-insensitively; `-` and spaces count as `_`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "admin" => Ok(Self::Admin),
            "scrum_master" => Ok(Self::ScrumMaster),
            "intern" => Ok(Self::Intern),
            _ => Err(ValidationError::UnknownRole {
                value: s.to_string(),
            }),
        }
    }
}
