//! Role capability checks.
//!
//! Unapproved accounts never hold a session, so every check here starts
//! from "is there a session" and then looks only at the role.

use crate::error::AuthorizationError;
use crate::identity::Identity;
use crate::session::SessionManager;
use std::sync::Arc;
use tracing::debug;

/// Answers role-capability questions for the current session.
#[derive(Debug, Clone)]
pub struct AuthorizationGate {
    session: Arc<SessionManager>,
}

impl AuthorizationGate {
    #[must_use]
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    /// True iff the identity may decide mentor requests.
    #[must_use]
    pub fn is_approver(&self, identity: &Identity) -> bool {
        identity.role().is_approver()
    }

    /// True iff the identity may manage accounts.
    #[must_use]
    pub fn is_admin(&self, identity: &Identity) -> bool {
        identity.role().is_admin()
    }

    /// True iff the identity may ask for a mentor.
    #[must_use]
    pub fn can_request_mentor(&self, identity: &Identity) -> bool {
        identity.role().can_request_mentor()
    }

    /// Removes the requester from a list of mentor candidates.
    #[must_use]
    pub fn eligible_mentor_targets(
        &self,
        candidates: Vec<Identity>,
        requester: &Identity,
    ) -> Vec<Identity> {
        candidates
            .into_iter()
            .filter(|candidate| candidate.id() != requester.id())
            .collect()
    }

    /// Returns the current identity, or `NotAuthenticated`.
    pub fn require_session(&self) -> Result<Identity, AuthorizationError> {
        self.session
            .current()
            .ok_or(AuthorizationError::NotAuthenticated)
    }

    /// Returns the current identity if it is an approver.
    pub fn require_approver(&self, action: &str) -> Result<Identity, AuthorizationError> {
        self.require(action, |identity| self.is_approver(identity))
    }

    /// Returns the current identity if it is an admin.
    pub fn require_admin(&self, action: &str) -> Result<Identity, AuthorizationError> {
        self.require(action, |identity| self.is_admin(identity))
    }

    /// Returns the current identity if it may request a mentor.
    pub fn require_mentor_requester(&self) -> Result<Identity, AuthorizationError> {
        self.require("request a mentor", |identity| {
            self.can_request_mentor(identity)
        })
    }

    fn require(
        &self,
        action: &str,
        allowed: impl Fn(&Identity) -> bool,
    ) -> Result<Identity, AuthorizationError> {
        let identity = self.require_session()?;
        if allowed(&identity) {
            Ok(identity)
        } else {
            debug!(user_id = %identity.id(), role = %identity.role(), action, "permission denied");
            Err(AuthorizationError::PermissionDenied {
                user_id: identity.id().clone(),
                action: action.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::NavigationLog;
    use crate::role::Role;
    use crate::session::AccessToken;
    use crate::store::MemorySessionStore;
    use ilm_core::UserId;

    fn identity(id: &str, role: Role) -> Identity {
        Identity::new(
            UserId::new(id).expect("valid"),
            id.to_string(),
            format!("{id}@example.com"),
            role,
        )
    }

    fn gate_for(identity: Option<Identity>) -> AuthorizationGate {
        let session = Arc::new(SessionManager::new(
            Arc::new(MemorySessionStore::new()),
            Arc::new(NavigationLog::new()),
        ));
        if let Some(identity) = identity {
            session
                .establish(identity, AccessToken::new("tok"))
                .expect("establish");
        }
        AuthorizationGate::new(session)
    }

    #[test]
    fn is_approver_by_role() {
        let gate = gate_for(None);
        assert!(gate.is_approver(&identity("a", Role::Admin)));
        assert!(gate.is_approver(&identity("s", Role::ScrumMaster)));
        assert!(!gate.is_approver(&identity("i", Role::Intern)));
    }

    #[test]
    fn eligible_targets_exclude_self() {
        let gate = gate_for(None);
        let me = identity("me", Role::Intern);
        let candidates = vec![
            identity("x", Role::Intern),
            me.clone(),
            identity("y", Role::Intern),
        ];

        let eligible = gate.eligible_mentor_targets(candidates, &me);

        assert_eq!(eligible.len(), 2);
        assert!(eligible.iter().all(|c| c.id() != me.id()));
    }

    #[test]
    fn require_session_without_session() {
        let gate = gate_for(None);
        assert_eq!(
            gate.require_session(),
            Err(AuthorizationError::NotAuthenticated)
        );
        assert_eq!(
            gate.require_approver("decide"),
            Err(AuthorizationError::NotAuthenticated)
        );
    }

    #[test]
    fn require_approver_denies_intern() {
        let gate = gate_for(Some(identity("i", Role::Intern)));
        let err = gate.require_approver("decide mentor requests").unwrap_err();
        assert_eq!(
            err,
            AuthorizationError::PermissionDenied {
                user_id: UserId::new("i").expect("valid"),
                action: "decide mentor requests".to_string(),
            }
        );
    }

    #[test]
    fn require_admin_allows_only_admin() {
        let gate = gate_for(Some(identity("s", Role::ScrumMaster)));
        assert!(gate.require_admin("approve accounts").is_err());
        assert!(gate.require_approver("decide").is_ok());

        let gate = gate_for(Some(identity("a", Role::Admin)));
        assert!(gate.require_admin("approve accounts").is_ok());
    }

    #[test]
    fn admins_do_not_request_mentors() {
        let gate = gate_for(Some(identity("a", Role::Admin)));
        assert!(gate.require_mentor_requester().is_err());

        let gate = gate_for(Some(identity("s", Role::ScrumMaster)));
        assert!(gate.require_mentor_requester().is_ok());
    }
}
