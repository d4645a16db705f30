//! The authenticated user's profile.
//!
//! An `Identity` is always the backing API's canonical view of the user,
//! fetched after a token is obtained. The client never assembles one from
//! partial login data.

use crate::role::Role;
use ilm_core::UserId;
use serde::{Deserialize, Serialize};

/// Canonical profile of a platform user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Platform user ID.
    id: UserId,
    /// Human-readable name.
    display_name: String,
    /// Normalized (trimmed, lower-cased) email address.
    email: String,
    /// The single role attached to the account.
    role: Role,
    /// Whether the account is active.
    #[serde(default = "default_true")]
    active: bool,
    /// Whether an admin has approved the account.
    #[serde(default = "default_true")]
    approved: bool,
}

fn default_true() -> bool {
    true
}

impl Identity {
    /// Creates an active, approved identity.
    #[must_use]
    pub fn new(id: UserId, display_name: String, email: String, role: Role) -> Self {
        Self {
            id,
            display_name,
            email,
            role,
            active: true,
            approved: true,
        }
    }

    /// Sets the account's active and approved flags.
    #[must_use]
    pub fn with_status(mut self, active: bool, approved: bool) -> Self {
        self.active = active;
        self.approved = approved;
        self
    }

    /// Returns the user ID.
    #[must_use]
    pub fn id(&self) -> &UserId {
        &self.id
    }

    /// Returns the display name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Returns the email address.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Returns the user's role.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Returns true if the account is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Returns true if the account has been approved.
    #[must_use]
    pub fn is_approved(&self) -> bool {
        self.approved
    }
}
