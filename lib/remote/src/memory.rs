//! In-process backing API.
//!
//! Holds accounts, tokens and mentor requests behind one lock so every
//! operation, `decide` included, is atomic. Enforces the same rules and
//! returns the same status codes as the HTTP backend, which makes it
//! usable for local runs and for end-to-end tests of the workflows.

use async_trait::async_trait;
use chrono::Utc;
use ilm_core::{MentorRequestId, UserId, normalize_email};
use ilm_mentorship::{
    Counterpart, Decision, MentorRequest, MentorRequestStatus, MentorshipSummary,
    RemoteWorkflowStore,
};
use ilm_platform_access::{
    AccessToken, AuthorizationCode, Credentials, Identity, Registration, RemoteDirectory,
    RemoteError, Role, SsoGrant,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

#[derive(Debug, Clone)]
struct Account {
    identity: Identity,
    password: String,
}

#[derive(Debug, Default)]
struct State {
    accounts: BTreeMap<UserId, Account>,
    tokens: HashMap<String, UserId>,
    sso_codes: HashMap<String, UserId>,
    sso_exchanges: usize,
    password_resets: Vec<String>,
    requests: BTreeMap<MentorRequestId, MentorRequest>,
    next_user: u64,
    next_token: u64,
    next_request: u64,
}

impl State {
    fn issue_token(&mut self, user_id: &UserId) -> AccessToken {
        self.next_token += 1;
        let token = format!("tok-{}-{}", self.next_token, user_id);
        self.tokens.insert(token.clone(), user_id.clone());
        AccessToken::new(token)
    }

    /// Resolves a token to its owner's current identity.
    fn caller(&self, token: &AccessToken) -> Result<Identity, RemoteError> {
        let user_id = self
            .tokens
            .get(token.secret())
            .ok_or_else(|| unauthorized("Could not validate credentials"))?;
        let account = self
            .accounts
            .get(user_id)
            .ok_or_else(|| unauthorized("Could not validate credentials"))?;
        if !account.identity.is_active() {
            return Err(bad_request("Inactive user"));
        }
        Ok(account.identity.clone())
    }

    fn approver(&self, token: &AccessToken) -> Result<Identity, RemoteError> {
        let caller = self.caller(token)?;
        if !caller.role().is_approver() {
            return Err(forbidden("Not enough permissions"));
        }
        Ok(caller)
    }

    fn admin(&self, token: &AccessToken) -> Result<Identity, RemoteError> {
        let caller = self.caller(token)?;
        if !caller.role().is_admin() {
            return Err(forbidden("Admin access required"));
        }
        Ok(caller)
    }

    fn find_by_email(&self, email: &str) -> Option<&Account> {
        self.accounts
            .values()
            .find(|account| account.identity.email() == email)
    }
}

fn unauthorized(message: &str) -> RemoteError {
    RemoteError::Unauthorized {
        message: Some(message.to_string()),
    }
}

fn forbidden(message: &str) -> RemoteError {
    RemoteError::Forbidden {
        message: Some(message.to_string()),
    }
}

fn bad_request(message: &str) -> RemoteError {
    RemoteError::Rejected {
        status: 400,
        message: Some(message.to_string()),
    }
}

fn internal(reason: impl std::fmt::Display) -> RemoteError {
    RemoteError::Unavailable {
        status: Some(500),
        message: Some(reason.to_string()),
    }
}

/// Backing API kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryRemote {
    state: Mutex<State>,
}

impl InMemoryRemote {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an account that can sign in with `password`.
    ///
    /// The account keeps the active and approved flags of `identity`.
    pub fn add_account(&self, identity: Identity, password: impl Into<String>) {
        let mut state = self.state.lock();
        state.accounts.insert(
            identity.id().clone(),
            Account {
                identity,
                password: password.into(),
            },
        );
    }

    /// Registers a single-use SSO authorization code for `user_id`.
    pub fn add_sso_code(&self, code: impl Into<String>, user_id: &UserId) {
        self.state
            .lock()
            .sso_codes
            .insert(code.into(), user_id.clone());
    }

    /// Number of SSO codes exchanged so far.
    #[must_use]
    pub fn sso_exchanges(&self) -> usize {
        self.state.lock().sso_exchanges
    }

    /// Addresses a password-reset email has been requested for, in order.
    #[must_use]
    pub fn password_reset_requests(&self) -> Vec<String> {
        self.state.lock().password_resets.clone()
    }

    /// Sets an account's active flag, as an admin deactivation would.
    pub fn set_active(&self, user_id: &UserId, active: bool) {
        if let Some(account) = self.state.lock().accounts.get_mut(user_id) {
            let approved = account.identity.is_approved();
            account.identity = account.identity.clone().with_status(active, approved);
        }
    }

    /// Invalidates a token, as an expiry on the server would.
    pub fn revoke_token(&self, token: &AccessToken) {
        self.state.lock().tokens.remove(token.secret());
    }

    /// Returns a stored request.
    #[must_use]
    pub fn request(&self, request_id: &MentorRequestId) -> Option<MentorRequest> {
        self.state.lock().requests.get(request_id).cloned()
    }

    /// Returns every stored request, oldest id first.
    #[must_use]
    pub fn requests(&self) -> Vec<MentorRequest> {
        self.state.lock().requests.values().cloned().collect()
    }
}

#[async_trait]
impl RemoteDirectory for InMemoryRemote {
    async fn login(&self, credentials: &Credentials) -> Result<AccessToken, RemoteError> {
        let mut state = self.state.lock();
        let email = normalize_email(credentials.email());
        let account = state
            .find_by_email(&email)
            .filter(|account| account.password == credentials.password())
            .cloned()
            .ok_or_else(|| unauthorized("Incorrect email or password"))?;

        if !account.identity.is_active() {
            return Err(bad_request("Your account has been deactivated"));
        }
        if !account.identity.is_approved() && !account.identity.role().is_admin() {
            return Err(forbidden("Your account is pending admin approval"));
        }

        debug!(user_id = %account.identity.id(), "issued token");
        Ok(state.issue_token(account.identity.id()))
    }

    async fn profile(&self, token: &AccessToken) -> Result<Identity, RemoteError> {
        self.state.lock().caller(token)
    }

    async fn register(&self, registration: &Registration) -> Result<Identity, RemoteError> {
        let mut state = self.state.lock();
        let email = normalize_email(registration.email());
        if state.find_by_email(&email).is_some() {
            return Err(bad_request("Email already registered"));
        }

        state.next_user += 1;
        let user_id = UserId::new(format!("u-{:06}", state.next_user)).map_err(internal)?;
        let approved = registration.role().is_admin();
        let identity = Identity::new(
            user_id.clone(),
            registration.name().to_string(),
            email,
            registration.role(),
        )
        .with_status(true, approved);
        state.accounts.insert(
            user_id,
            Account {
                identity: identity.clone(),
                password: registration.password().to_string(),
            },
        );
        info!(user_id = %identity.id(), role = %identity.role(), "account registered");
        Ok(identity)
    }

    async fn exchange_sso_code(&self, code: &AuthorizationCode) -> Result<SsoGrant, RemoteError> {
        let mut state = self.state.lock();
        let user_id = state
            .sso_codes
            .remove(code.secret())
            .ok_or_else(|| bad_request("Invalid or expired authorization code"))?;
        state.sso_exchanges += 1;

        let identity = state
            .accounts
            .get(&user_id)
            .map(|account| account.identity.clone())
            .ok_or_else(|| unauthorized("No account for this identity"))?;
        if !identity.is_approved() && !identity.role().is_admin() {
            return Err(forbidden("Your account is pending admin approval"));
        }
        let token = state.issue_token(&user_id);
        Ok(SsoGrant { token, identity })
    }

    async fn request_password_reset(&self, email: &str) -> Result<(), RemoteError> {
        let mut state = self.state.lock();
        let email = normalize_email(email);
        if state.find_by_email(&email).is_none() {
            return Err(RemoteError::NotFound {
                message: Some("Email not found".to_string()),
            });
        }
        debug!("password reset email queued");
        state.password_resets.push(email);
        Ok(())
    }

    async fn list_identities(
        &self,
        token: &AccessToken,
        role: Option<Role>,
    ) -> Result<Vec<Identity>, RemoteError> {
        let state = self.state.lock();
        state.caller(token)?;
        Ok(state
            .accounts
            .values()
            .map(|account| &account.identity)
            .filter(|identity| role.is_none_or(|role| identity.role() == role))
            .cloned()
            .collect())
    }

    async fn pending_accounts(&self, token: &AccessToken) -> Result<Vec<Identity>, RemoteError> {
        let state = self.state.lock();
        state.admin(token)?;
        Ok(state
            .accounts
            .values()
            .filter(|account| !account.identity.is_approved())
            .map(|account| account.identity.clone())
            .collect())
    }

    async fn approve_account(
        &self,
        token: &AccessToken,
        user_id: &UserId,
        role: Role,
    ) -> Result<Identity, RemoteError> {
        let mut state = self.state.lock();
        state.admin(token)?;
        let account = state
            .accounts
            .get_mut(user_id)
            .ok_or_else(|| RemoteError::NotFound {
                message: Some("User not found".to_string()),
            })?;
        account.identity = Identity::new(
            account.identity.id().clone(),
            account.identity.display_name().to_string(),
            account.identity.email().to_string(),
            role,
        )
        .with_status(account.identity.is_active(), true);
        Ok(account.identity.clone())
    }
}

#[async_trait]
impl RemoteWorkflowStore for InMemoryRemote {
    async fn create_request(
        &self,
        token: &AccessToken,
        mentor_id: &UserId,
    ) -> Result<MentorRequest, RemoteError> {
        let mut state = self.state.lock();
        let caller = state.caller(token)?;
        if !caller.role().can_request_mentor() {
            return Err(forbidden("Only interns and scrum masters can request mentors"));
        }
        if caller.id() == mentor_id {
            return Err(bad_request("Cannot request yourself as mentor"));
        }
        let mentor = state
            .accounts
            .get(mentor_id)
            .map(|account| account.identity.clone())
            .ok_or_else(|| RemoteError::NotFound {
                message: Some("Mentor not found".to_string()),
            })?;
        if mentor.role() != Role::Intern {
            return Err(bad_request("Mentor must be an intern"));
        }
        let duplicate = state.requests.values().any(|request| {
            request.is_pending()
                && request.requester().user_id() == caller.id()
                && request.mentor().user_id() == mentor_id
        });
        if duplicate {
            return Err(RemoteError::Conflict {
                message: Some("Request already pending".to_string()),
            });
        }

        state.next_request += 1;
        let id = MentorRequestId::new(format!("mr-{:06}", state.next_request)).map_err(internal)?;
        let request = MentorRequest::open(
            id.clone(),
            Counterpart::from(&caller),
            Counterpart::from(&mentor),
            Utc::now(),
        )
        .map_err(|e| bad_request(&e.to_string()))?;
        state.requests.insert(id, request.clone());
        Ok(request)
    }

    async fn list_mine(&self, token: &AccessToken) -> Result<Vec<MentorRequest>, RemoteError> {
        let state = self.state.lock();
        let caller = state.caller(token)?;
        Ok(state
            .requests
            .values()
            .filter(|request| {
                request.requester().user_id() == caller.id()
                    || request.mentor().user_id() == caller.id()
            })
            .cloned()
            .collect())
    }

    async fn list_by_status(
        &self,
        token: &AccessToken,
        status: Option<MentorRequestStatus>,
    ) -> Result<Vec<MentorRequest>, RemoteError> {
        let state = self.state.lock();
        state.approver(token)?;
        Ok(state
            .requests
            .values()
            .filter(|request| status.is_none_or(|status| request.status() == status))
            .cloned()
            .collect())
    }

    async fn decide(
        &self,
        token: &AccessToken,
        request_id: &MentorRequestId,
        decision: Decision,
    ) -> Result<MentorRequest, RemoteError> {
        let mut state = self.state.lock();
        let approver = state.approver(token)?;
        let request = state
            .requests
            .get_mut(request_id)
            .ok_or_else(|| RemoteError::NotFound {
                message: Some("Mentor request not found".to_string()),
            })?;
        request
            .decide(decision, approver.id().to_string(), Utc::now())
            .map_err(|e| RemoteError::Conflict {
                message: Some(e.to_string()),
            })?;
        Ok(request.clone())
    }

    async fn mentorship_summary(
        &self,
        token: &AccessToken,
    ) -> Result<MentorshipSummary, RemoteError> {
        let state = self.state.lock();
        let caller = state.caller(token)?;
        let requests: Vec<MentorRequest> = state.requests.values().cloned().collect();
        Ok(MentorshipSummary::fold(caller.id(), &requests))
    }
}
