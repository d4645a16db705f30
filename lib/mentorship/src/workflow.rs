//! Mentor request workflow.
//!
//! Every operation runs through the session: the gate decides whether the
//! caller may proceed, and the remote call is made with the session token
//! so an expired token ends the session in one place.

use crate::error::{ConflictError, MentorshipError};
use crate::request::{Decision, MentorRequest, MentorRequestStatus, newest_first};
use crate::store::RemoteWorkflowStore;
use crate::summary::MentorshipSummary;
use ilm_core::{MentorRequestId, UserId};
use ilm_platform_access::{
    AuthorizationGate, Identity, RemoteDirectory, RemoteError, Role, SessionManager,
    ValidationError,
};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Creates, lists and decides mentor requests.
pub struct MentorWorkflow {
    session: Arc<SessionManager>,
    gate: AuthorizationGate,
    store: Arc<dyn RemoteWorkflowStore>,
    directory: Arc<dyn RemoteDirectory>,
}

impl MentorWorkflow {
    #[must_use]
    pub fn new(
        session: Arc<SessionManager>,
        store: Arc<dyn RemoteWorkflowStore>,
        directory: Arc<dyn RemoteDirectory>,
    ) -> Self {
        let gate = AuthorizationGate::new(session.clone());
        Self {
            session,
            gate,
            store,
            directory,
        }
    }

    /// Asks `mentor_id` to be the caller's mentor.
    ///
    /// Rejects self-selection and a second pending request to the same
    /// mentor.
    #[instrument(skip(self))]
    pub async fn request_mentor(
        &self,
        mentor_id: &str,
    ) -> ilm_core::Result<MentorRequest, MentorshipError> {
        let caller = self
            .gate
            .require_mentor_requester()
            .map_err(MentorshipError::from)?;
        let mentor_id = UserId::new(mentor_id).map_err(|_| {
            MentorshipError::from(ValidationError::MissingField { field: "mentor_id" })
        })?;
        if &mentor_id == caller.id() {
            return Err(MentorshipError::from(ValidationError::SelfMentorship).into());
        }

        let mine = self
            .session
            .authorized(|token| async move { self.store.list_mine(&token).await })
            .await
            .map_err(MentorshipError::from)?;
        let duplicate = mine.iter().any(|r| {
            r.is_pending()
                && r.requester().user_id() == caller.id()
                && r.mentor().user_id() == &mentor_id
        });
        if duplicate {
            debug!(mentor_id = %mentor_id, "pending request already exists");
            return Err(MentorshipError::from(ConflictError::DuplicatePending { mentor_id }).into());
        }

        let created = self
            .session
            .authorized(|token| {
                let mentor_id = &mentor_id;
                async move { self.store.create_request(&token, mentor_id).await }
            })
            .await
            .map_err(|e| match MentorshipError::from(e) {
                MentorshipError::Remote(RemoteError::Conflict { .. }) => {
                    MentorshipError::Conflict(ConflictError::DuplicatePending {
                        mentor_id: mentor_id.clone(),
                    })
                }
                other => other,
            })?;

        info!(
            request_id = %created.id(),
            requester_id = %caller.id(),
            mentor_id = %created.mentor().user_id(),
            "mentor request created"
        );
        Ok(created)
    }

    /// The caller's own requests, all statuses, newest first.
    #[instrument(skip(self))]
    pub async fn list_mine(&self) -> ilm_core::Result<Vec<MentorRequest>, MentorshipError> {
        let caller = self.gate.require_session().map_err(MentorshipError::from)?;
        let mut requests: Vec<MentorRequest> = self
            .session
            .authorized(|token| async move { self.store.list_mine(&token).await })
            .await
            .map_err(MentorshipError::from)?
            .into_iter()
            .filter(|r| r.requester().user_id() == caller.id())
            .collect();
        newest_first(&mut requests);
        Ok(requests)
    }

    /// All pending requests system-wide, newest first. Approvers only.
    #[instrument(skip(self))]
    pub async fn list_pending(&self) -> ilm_core::Result<Vec<MentorRequest>, MentorshipError> {
        self.gate
            .require_approver("list pending mentor requests")
            .map_err(MentorshipError::from)?;
        let mut requests: Vec<MentorRequest> = self
            .session
            .authorized(|token| async move {
                self.store
                    .list_by_status(&token, Some(MentorRequestStatus::Pending))
                    .await
            })
            .await
            .map_err(MentorshipError::from)?
            .into_iter()
            .filter(MentorRequest::is_pending)
            .collect();
        newest_first(&mut requests);
        Ok(requests)
    }

    /// Approves or rejects a pending request. Approvers only.
    ///
    /// A request that is already decided stays as it is and the call fails
    /// with [`ConflictError::AlreadyDecided`].
    #[instrument(skip(self, request_id), fields(request_id = %request_id))]
    pub async fn decide(
        &self,
        request_id: &MentorRequestId,
        decision: Decision,
    ) -> ilm_core::Result<MentorRequest, MentorshipError> {
        let approver = self
            .gate
            .require_approver("decide mentor requests")
            .map_err(MentorshipError::from)?;

        let updated = self
            .session
            .authorized(|token| async move { self.store.decide(&token, request_id, decision).await })
            .await
            .map_err(|e| match MentorshipError::from(e) {
                MentorshipError::Remote(RemoteError::Conflict { .. }) => {
                    MentorshipError::Conflict(ConflictError::AlreadyDecided {
                        request_id: request_id.clone(),
                        status: None,
                    })
                }
                other => other,
            })?;

        if updated.status() != decision.status() {
            return Err(MentorshipError::Remote(RemoteError::Malformed {
                operation: "decide",
                reason: format!(
                    "expected status {}, got {}",
                    decision.status(),
                    updated.status()
                ),
            })
            .into());
        }

        info!(
            decided_by = %approver.id(),
            status = %updated.status(),
            "mentor request decided"
        );
        Ok(updated)
    }

    /// Folds `identity`'s mentor and mentees from approved requests.
    ///
    /// For the caller this reads their own requests; for anyone else the
    /// caller must be an approver.
    #[instrument(skip(self, identity), fields(user_id = %identity.id()))]
    pub async fn mentorship_summary(
        &self,
        identity: &Identity,
    ) -> ilm_core::Result<MentorshipSummary, MentorshipError> {
        let caller = self.gate.require_session().map_err(MentorshipError::from)?;

        let requests = if caller.id() == identity.id() {
            self.session
                .authorized(|token| async move { self.store.list_mine(&token).await })
                .await
        } else {
            self.gate
                .require_approver("view other users' mentorships")
                .map_err(MentorshipError::from)?;
            self.session
                .authorized(|token| async move {
                    self.store
                        .list_by_status(&token, Some(MentorRequestStatus::Approved))
                        .await
                })
                .await
        }
        .map_err(MentorshipError::from)?;

        Ok(MentorshipSummary::fold(identity.id(), &requests))
    }

    /// The caller's mentorship view as reported by the backing API.
    #[instrument(skip(self))]
    pub async fn my_mentorships(&self) -> ilm_core::Result<MentorshipSummary, MentorshipError> {
        self.gate.require_session().map_err(MentorshipError::from)?;
        let summary = self
            .session
            .authorized(|token| async move { self.store.mentorship_summary(&token).await })
            .await
            .map_err(MentorshipError::from)?;
        Ok(summary)
    }

    /// Interns the caller may pick as mentor; never includes the caller.
    #[instrument(skip(self))]
    pub async fn mentor_candidates(&self) -> ilm_core::Result<Vec<Identity>, MentorshipError> {
        let caller = self.gate.require_session().map_err(MentorshipError::from)?;
        let candidates = self
            .session
            .authorized(|token| async move {
                self.directory
                    .list_identities(&token, Some(Role::Intern))
                    .await
            })
            .await
            .map_err(MentorshipError::from)?;
        Ok(self.gate.eligible_mentor_targets(candidates, &caller))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Counterpart;
    use async_trait::async_trait;
    use chrono::Utc;
    use ilm_platform_access::{
        AccessToken, AuthenticationError, AuthorizationCode, AuthorizationError, Credentials,
        MemorySessionStore,
        NavigationLog, Registration, SsoGrant,
    };
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn identity(id: &str, role: Role) -> Identity {
        Identity::new(
            UserId::new(id).expect("valid"),
            id.to_uppercase(),
            format!("{id}@example.com"),
            role,
        )
    }

    /// Fake backend keyed by token; tokens are the user ids.
    #[derive(Default)]
    struct FakeBackend {
        users: HashMap<String, Identity>,
        requests: Mutex<Vec<MentorRequest>>,
        next_id: AtomicUsize,
        expire_tokens: AtomicBool,
        creates: AtomicUsize,
    }

    impl FakeBackend {
        fn with_users(users: &[Identity]) -> Self {
            Self {
                users: users
                    .iter()
                    .map(|u| (u.id().as_str().to_string(), u.clone()))
                    .collect(),
                ..Default::default()
            }
        }

        fn caller(&self, token: &AccessToken) -> Result<&Identity, RemoteError> {
            if self.expire_tokens.load(Ordering::SeqCst) {
                return Err(RemoteError::Unauthorized { message: None });
            }
            self.users
                .get(token.secret())
                .ok_or(RemoteError::Unauthorized { message: None })
        }
    }

    #[async_trait]
    impl RemoteWorkflowStore for FakeBackend {
        async fn create_request(
            &self,
            token: &AccessToken,
            mentor_id: &UserId,
        ) -> Result<MentorRequest, RemoteError> {
            let caller = self.caller(token)?;
            self.creates.fetch_add(1, Ordering::SeqCst);
            let mentor = self
                .users
                .get(mentor_id.as_str())
                .ok_or(RemoteError::NotFound {
                    message: Some("Mentor not found".to_string()),
                })?;
            let n = self.next_id.fetch_add(1, Ordering::SeqCst);
            let request = MentorRequest::open(
                MentorRequestId::new(format!("r-{n}")).expect("valid"),
                Counterpart::from(caller),
                Counterpart::from(mentor),
                Utc::now(),
            )
            .map_err(|e| RemoteError::Rejected {
                status: 400,
                message: Some(e.to_string()),
            })?;
            self.requests.lock().push(request.clone());
            Ok(request)
        }

        async fn list_mine(&self, token: &AccessToken) -> Result<Vec<MentorRequest>, RemoteError> {
            let caller = self.caller(token)?;
            Ok(self
                .requests
                .lock()
                .iter()
                .filter(|r| {
                    r.requester().user_id() == caller.id() || r.mentor().user_id() == caller.id()
                })
                .cloned()
                .collect())
        }

        async fn list_by_status(
            &self,
            token: &AccessToken,
            status: Option<MentorRequestStatus>,
        ) -> Result<Vec<MentorRequest>, RemoteError> {
            self.caller(token)?;
            Ok(self
                .requests
                .lock()
                .iter()
                .filter(|r| status.is_none_or(|s| r.status() == s))
                .cloned()
                .collect())
        }

        async fn decide(
            &self,
            token: &AccessToken,
            request_id: &MentorRequestId,
            decision: Decision,
        ) -> Result<MentorRequest, RemoteError> {
            let caller = self.caller(token)?;
            let mut requests = self.requests.lock();
            let request = requests
                .iter_mut()
                .find(|r| r.id() == request_id)
                .ok_or(RemoteError::NotFound { message: None })?;
            request
                .decide(decision, caller.id().to_string(), Utc::now())
                .map_err(|e| RemoteError::Conflict {
                    message: Some(e.to_string()),
                })?;
            Ok(request.clone())
        }

        async fn mentorship_summary(
            &self,
            token: &AccessToken,
        ) -> Result<MentorshipSummary, RemoteError> {
            let caller = self.caller(token)?;
            Ok(MentorshipSummary::fold(caller.id(), &self.requests.lock()))
        }
    }

    #[async_trait]
    impl RemoteDirectory for FakeBackend {
        async fn login(&self, _credentials: &Credentials) -> Result<AccessToken, RemoteError> {
            Err(RemoteError::Unauthorized { message: None })
        }

        async fn profile(&self, token: &AccessToken) -> Result<Identity, RemoteError> {
            self.caller(token).cloned()
        }

        async fn register(&self, _registration: &Registration) -> Result<Identity, RemoteError> {
            Err(RemoteError::Forbidden { message: None })
        }

        async fn exchange_sso_code(
            &self,
            _code: &AuthorizationCode,
        ) -> Result<SsoGrant, RemoteError> {
            Err(RemoteError::Unauthorized { message: None })
        }

        async fn list_identities(
            &self,
            token: &AccessToken,
            role: Option<Role>,
        ) -> Result<Vec<Identity>, RemoteError> {
            self.caller(token)?;
            let mut users: Vec<Identity> = self
                .users
                .values()
                .filter(|u| role.is_none_or(|r| u.role() == r))
                .cloned()
                .collect();
            users.sort_by(|a, b| a.id().cmp(b.id()));
            Ok(users)
        }

        async fn pending_accounts(&self, _token: &AccessToken) -> Result<Vec<Identity>, RemoteError> {
            Ok(Vec::new())
        }

        async fn request_password_reset(&self, _email: &str) -> Result<(), RemoteError> {
            Ok(())
        }

        async fn approve_account(
            &self,
            _token: &AccessToken,
            _user_id: &UserId,
            _role: Role,
        ) -> Result<Identity, RemoteError> {
            Err(RemoteError::Forbidden { message: None })
        }
    }

    struct Harness {
        backend: Arc<FakeBackend>,
        session: Arc<SessionManager>,
        workflow: MentorWorkflow,
    }

    impl Harness {
        fn new() -> Self {
            let backend = Arc::new(FakeBackend::with_users(&[
                identity("a", Role::Intern),
                identity("b", Role::Intern),
                identity("c", Role::Admin),
                identity("s", Role::ScrumMaster),
            ]));
            let session = Arc::new(SessionManager::new(
                Arc::new(MemorySessionStore::new()),
                Arc::new(NavigationLog::new()),
            ));
            let workflow = MentorWorkflow::new(session.clone(), backend.clone(), backend.clone());
            Self {
                backend,
                session,
                workflow,
            }
        }

        fn sign_in(&self, id: &str) {
            let identity = self.backend.users.get(id).expect("known user").clone();
            self.session
                .establish(identity, AccessToken::new(id))
                .expect("establish");
        }
    }

    #[tokio::test]
    async fn request_mentor_creates_pending() {
        let h = Harness::new();
        h.sign_in("a");

        let request = h.workflow.request_mentor("b").await.expect("request");

        assert_eq!(request.status(), MentorRequestStatus::Pending);
        assert_eq!(request.requester().user_id().as_str(), "a");
        assert_eq!(request.mentor().user_id().as_str(), "b");
    }

    #[tokio::test]
    async fn request_self_is_validation_error() {
        let h = Harness::new();
        h.sign_in("a");

        let report = h.workflow.request_mentor("a").await.unwrap_err();

        assert_eq!(
            report.current_context(),
            &MentorshipError::Validation(ValidationError::SelfMentorship)
        );
        assert_eq!(h.backend.creates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn request_without_mentor_is_validation_error() {
        let h = Harness::new();
        h.sign_in("a");

        let report = h.workflow.request_mentor("  ").await.unwrap_err();
        assert_eq!(
            report.current_context(),
            &MentorshipError::Validation(ValidationError::MissingField { field: "mentor_id" })
        );
    }

    #[tokio::test]
    async fn duplicate_pending_request_conflicts() {
        let h = Harness::new();
        h.sign_in("a");
        h.workflow.request_mentor("b").await.expect("first");

        let report = h.workflow.request_mentor("b").await.unwrap_err();

        assert!(matches!(
            report.current_context(),
            MentorshipError::Conflict(ConflictError::DuplicatePending { .. })
        ));
        assert_eq!(h.backend.creates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn request_without_session_is_authentication_error() {
        let h = Harness::new();
        let report = h.workflow.request_mentor("b").await.unwrap_err();
        assert_eq!(
            report.current_context(),
            &MentorshipError::Authentication(AuthenticationError::NotAuthenticated)
        );
    }

    #[tokio::test]
    async fn admin_cannot_request_mentor() {
        let h = Harness::new();
        h.sign_in("c");
        let report = h.workflow.request_mentor("b").await.unwrap_err();
        assert!(matches!(
            report.current_context(),
            MentorshipError::Authorization(AuthorizationError::PermissionDenied { .. })
        ));
    }

    #[tokio::test]
    async fn list_mine_excludes_requests_where_caller_is_mentor() {
        let h = Harness::new();
        h.sign_in("b");
        h.workflow.request_mentor("a").await.expect("b asks a");
        h.sign_in("a");
        h.workflow.request_mentor("b").await.expect("a asks b");

        let mine = h.workflow.list_mine().await.expect("list");

        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].requester().user_id().as_str(), "a");
    }

    #[tokio::test]
    async fn intern_cannot_list_pending_or_decide() {
        let h = Harness::new();
        h.sign_in("a");
        let request = h.workflow.request_mentor("b").await.expect("request");

        assert!(h.workflow.list_pending().await.is_err());
        let report = h
            .workflow
            .decide(request.id(), Decision::Approved)
            .await
            .unwrap_err();
        assert!(matches!(
            report.current_context(),
            MentorshipError::Authorization(_)
        ));
    }

    #[tokio::test]
    async fn approval_flows_into_summaries() {
        let h = Harness::new();
        h.sign_in("a");
        let request = h.workflow.request_mentor("b").await.expect("request");

        h.sign_in("s");
        let pending = h.workflow.list_pending().await.expect("pending");
        assert_eq!(pending.len(), 1);
        let approved = h
            .workflow
            .decide(request.id(), Decision::Approved)
            .await
            .expect("decide");
        assert_eq!(approved.approved_by(), Some("s"));
        assert!(h.workflow.list_pending().await.expect("pending").is_empty());

        let a = identity("a", Role::Intern);
        let b = identity("b", Role::Intern);
        let for_a = h.workflow.mentorship_summary(&a).await.expect("summary a");
        assert_eq!(for_a.mentor().map(|m| m.user_id().as_str()), Some("b"));
        let for_b = h.workflow.mentorship_summary(&b).await.expect("summary b");
        assert!(for_b.has_mentee(a.id()));

        h.sign_in("b");
        let mine = h.workflow.my_mentorships().await.expect("mine");
        assert!(mine.has_mentee(a.id()));
    }

    #[tokio::test]
    async fn second_decision_conflicts() {
        let h = Harness::new();
        h.sign_in("a");
        let request = h.workflow.request_mentor("b").await.expect("request");
        h.sign_in("c");
        h.workflow
            .decide(request.id(), Decision::Approved)
            .await
            .expect("first decide");

        let report = h
            .workflow
            .decide(request.id(), Decision::Rejected)
            .await
            .unwrap_err();

        assert!(matches!(
            report.current_context(),
            MentorshipError::Conflict(ConflictError::AlreadyDecided { .. })
        ));
        let stored = h.backend.requests.lock()[0].clone();
        assert_eq!(stored.status(), MentorRequestStatus::Approved);
    }

    #[tokio::test]
    async fn repeated_approval_conflicts() {
        let h = Harness::new();
        h.sign_in("a");
        let request = h.workflow.request_mentor("b").await.expect("request");
        h.sign_in("c");
        h.workflow
            .decide(request.id(), Decision::Approved)
            .await
            .expect("first decide");

        let report = h
            .workflow
            .decide(request.id(), Decision::Approved)
            .await
            .unwrap_err();

        assert!(matches!(
            report.current_context(),
            MentorshipError::Conflict(ConflictError::AlreadyDecided { .. })
        ));
        let stored = h.backend.requests.lock()[0].clone();
        assert_eq!(stored.status(), MentorRequestStatus::Approved);
        assert_eq!(stored.approved_by(), Some("c"));
    }

    #[tokio::test]
    async fn rejected_request_cannot_be_approved() {
        let h = Harness::new();
        h.sign_in("a");
        let request = h.workflow.request_mentor("b").await.expect("request");
        h.sign_in("s");
        h.workflow
            .decide(request.id(), Decision::Rejected)
            .await
            .expect("reject");
        h.sign_in("c");

        let report = h
            .workflow
            .decide(request.id(), Decision::Approved)
            .await
            .unwrap_err();

        assert!(matches!(
            report.current_context(),
            MentorshipError::Conflict(ConflictError::AlreadyDecided { .. })
        ));
        let stored = h.backend.requests.lock()[0].clone();
        assert_eq!(stored.status(), MentorRequestStatus::Rejected);
        assert_eq!(stored.approved_by(), Some("s"));
    }

    #[tokio::test]
    async fn intern_cannot_view_other_summaries() {
        let h = Harness::new();
        h.sign_in("a");
        let other = identity("b", Role::Intern);
        assert!(h.workflow.mentorship_summary(&other).await.is_err());
    }

    #[tokio::test]
    async fn mentor_candidates_exclude_caller() {
        let h = Harness::new();
        h.sign_in("a");

        let candidates = h.workflow.mentor_candidates().await.expect("candidates");

        let ids: Vec<_> = candidates.iter().map(|c| c.id().as_str()).collect();
        assert_eq!(ids, vec!["b"]);
    }

    #[tokio::test]
    async fn expired_token_clears_session() {
        let h = Harness::new();
        h.sign_in("a");
        h.backend.expire_tokens.store(true, Ordering::SeqCst);

        let report = h.workflow.list_mine().await.unwrap_err();

        assert!(matches!(
            report.current_context(),
            MentorshipError::Authentication(AuthenticationError::SessionExpired { .. })
        ));
        assert_eq!(h.session.current(), None);
        let again = h.workflow.list_mine().await.unwrap_err();
        assert_eq!(
            again.current_context(),
            &MentorshipError::Authentication(AuthenticationError::NotAuthenticated)
        );
    }
}
