//! Client navigation targets.
//!
//! Every navigation is a full reset of client state; there is no partial
//! in-place update after a session change.

use crate::role::Role;
use parking_lot::Mutex;

/// Where the client should go next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// The unauthenticated entry point, optionally with a visible notice.
    Login { notice: Option<String> },
    /// The role-specific landing page.
    Landing(Role),
}

impl Destination {
    /// Route path for this destination.
    #[must_use]
    pub fn path(&self) -> &'static str {
        match self {
            Self::Login { .. } => "/login",
            Self::Landing(role) => role.landing_path(),
        }
    }
}

/// Performs full navigations on behalf of the session layer.
pub trait Navigator: Send + Sync {
    fn navigate(&self, destination: Destination);
}

/// Navigator that records destinations instead of acting on them.
#[derive(Debug, Default)]
pub struct NavigationLog {
    entries: Mutex<Vec<Destination>>,
}

impl NavigationLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All destinations navigated to, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<Destination> {
        self.entries.lock().clone()
    }

    /// The most recent destination.
    #[must_use]
    pub fn last(&self) -> Option<Destination> {
        self.entries.lock().last().cloned()
    }
}

impl Navigator for NavigationLog {
    fn navigate(&self, destination: Destination) {
        self.entries.lock().push(destination);
    }
}
