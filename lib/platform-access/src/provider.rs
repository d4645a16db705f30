//! Credential login, registration, SSO completion and account approval.
//!
//! The identity of record is always the backing API's profile, fetched with
//! the freshly issued token. A token without a profile never becomes a
//! session, and neither does a profile that is deactivated or, for
//! non-admins, not yet approved.

use crate::directory::{Credentials, Registration, RemoteDirectory};
use crate::error::{AuthError, AuthenticationError, RemoteError, SessionCallError, ValidationError};
use crate::gate::AuthorizationGate;
use crate::identity::Identity;
use crate::role::Role;
use crate::session::{Session, SessionManager};
use crate::sso::{CallbackOutcome, SsoAttempt, SsoCallback, SsoPhase};
use ilm_core::{UserId, normalize_email};
use rootcause::prelude::Report;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Performs the operations that create, restore and end sessions.
pub struct IdentityProvider {
    directory: Arc<dyn RemoteDirectory>,
    session: Arc<SessionManager>,
    gate: AuthorizationGate,
}

impl IdentityProvider {
    #[must_use]
    pub fn new(directory: Arc<dyn RemoteDirectory>, session: Arc<SessionManager>) -> Self {
        let gate = AuthorizationGate::new(session.clone());
        Self {
            directory,
            session,
            gate,
        }
    }

    #[must_use]
    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    #[must_use]
    pub fn gate(&self) -> &AuthorizationGate {
        &self.gate
    }

    /// Signs in with email and password.
    ///
    /// On success the session holds the profile reported by the backing API
    /// and the client is sent to the role's landing page.
    #[instrument(skip(self, email, password))]
    pub async fn login(&self, email: &str, password: &str) -> ilm_core::Result<Session, AuthError> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(missing_field("email"));
        }
        if password.is_empty() {
            return Err(missing_field("password"));
        }

        let credentials = Credentials::new(email, password.to_string());
        let token = self
            .directory
            .login(&credentials)
            .await
            .map_err(credential_error)?;

        let identity = match self.directory.profile(&token).await {
            Ok(identity) => identity,
            Err(e) => {
                warn!(error = %e, "profile fetch failed after login");
                self.session.clear();
                return Err(AuthError::Authentication(
                    AuthenticationError::ProfileUnavailable {
                        reason: e.message(),
                    },
                )
                .into());
            }
        };
        if let Err(e) = check_standing(&identity) {
            warn!(user_id = %identity.id(), error = %e, "profile refused after login");
            self.session.clear();
            return Err(AuthError::Authentication(e).into());
        }

        let session = self
            .session
            .establish(identity, token)
            .map_err(AuthError::from)?;
        info!(user_id = %session.identity().id(), "login succeeded");
        self.session.navigate_to_landing();
        Ok(session)
    }

    /// Creates an account. No session is established; the account may
    /// need admin approval before its first login.
    #[instrument(skip(self, name, email, password))]
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: &str,
    ) -> ilm_core::Result<Identity, AuthError> {
        let name = name.trim();
        let email = normalize_email(email);
        if name.is_empty() {
            return Err(missing_field("name"));
        }
        if email.is_empty() {
            return Err(missing_field("email"));
        }
        if password.is_empty() {
            return Err(missing_field("password"));
        }
        let role = role.parse::<Role>().map_err(AuthError::from)?;

        let registration = Registration::new(name.to_string(), email, password.to_string(), role);
        let identity = self
            .directory
            .register(&registration)
            .await
            .map_err(AuthError::from)?;
        info!(
            user_id = %identity.id(),
            approved = identity.is_approved(),
            "account registered"
        );
        Ok(identity)
    }

    /// Asks the backing API to email a password-reset link to `email`.
    ///
    /// Upstream refusals, such as an unknown address, surface with the
    /// API's own message.
    #[instrument(skip(self, email))]
    pub async fn request_password_reset(&self, email: &str) -> ilm_core::Result<(), AuthError> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(missing_field("email"));
        }
        if !looks_like_email(&email) {
            return Err(AuthError::Validation(ValidationError::InvalidValue {
                field: "email",
                value: email,
            })
            .into());
        }

        self.directory
            .request_password_reset(&email)
            .await
            .map_err(|e| {
                warn!(error = %e, "password reset request failed");
                AuthError::from(e)
            })?;
        info!("password reset requested");
        Ok(())
    }

    /// Ends the session.
    pub fn logout(&self) {
        self.session.clear();
    }

    /// Revalidates a persisted session against the backing API.
    ///
    /// The stored identity snapshot is replaced by the current profile. Any
    /// failure, or a profile that may no longer sign in, leaves the client
    /// without a session.
    #[instrument(skip(self))]
    pub async fn restore(&self) -> ilm_core::Result<Option<Identity>, AuthError> {
        let Some(token) = self.session.token() else {
            return Ok(None);
        };

        let result = self
            .session
            .authorized(|token| async move { self.directory.profile(&token).await })
            .await;

        match result {
            Ok(identity) => {
                if let Err(e) = check_standing(&identity) {
                    debug!(error = %e, "persisted session refused");
                    self.session.clear_with_notice(Some(e.to_string()));
                    return Ok(None);
                }
                let session = self
                    .session
                    .establish(identity, token)
                    .map_err(AuthError::from)?;
                debug!(user_id = %session.identity().id(), "session restored");
                Ok(Some(session.identity().clone()))
            }
            Err(SessionCallError::Authentication(e)) => {
                debug!(error = %e, "persisted session no longer valid");
                Ok(None)
            }
            Err(SessionCallError::Remote(e)) => {
                warn!(error = %e, "could not revalidate persisted session");
                self.session.clear();
                Ok(None)
            }
        }
    }

    /// Completes an SSO attempt with the parameters the provider returned.
    ///
    /// Only the first callback for an attempt does anything; later ones
    /// return [`CallbackOutcome::AlreadyHandled`].
    #[instrument(skip(self, attempt, callback), fields(phase = ?attempt.phase()))]
    pub async fn handle_sso_callback(
        &self,
        attempt: &SsoAttempt,
        callback: &SsoCallback,
    ) -> ilm_core::Result<CallbackOutcome, AuthError> {
        if !attempt.receive() {
            debug!("sso callback already handled");
            return Ok(CallbackOutcome::AlreadyHandled);
        }

        if let Some(reason) = callback.provider_error() {
            return Err(self.fail_sso(
                attempt,
                AuthenticationError::ProviderError {
                    reason: reason.to_string(),
                }
                .into(),
            ));
        }
        let Some(code) = callback.authorization_code() else {
            return Err(self.fail_sso(attempt, AuthenticationError::MissingCode.into()));
        };
        if !attempt.verify_state(callback.state.as_deref()) {
            return Err(self.fail_sso(attempt, AuthenticationError::StateMismatch.into()));
        }

        if !attempt.transition(SsoPhase::CodeReceived, SsoPhase::Exchanging) {
            warn!(phase = ?attempt.phase(), "sso attempt left the received phase");
            return Ok(CallbackOutcome::AlreadyHandled);
        }
        let grant = match self.directory.exchange_sso_code(&code).await {
            Ok(grant) => grant,
            Err(e) => return Err(self.fail_sso(attempt, credential_error(e))),
        };
        if let Err(e) = check_standing(&grant.identity) {
            return Err(self.fail_sso(attempt, e.into()));
        }

        match self.session.establish(grant.identity, grant.token) {
            Ok(session) => {
                if !attempt.transition(SsoPhase::Exchanging, SsoPhase::Established) {
                    warn!(phase = ?attempt.phase(), "sso attempt changed phase during exchange");
                }
                info!(user_id = %session.identity().id(), "sso login succeeded");
                self.session.navigate_to_landing();
                Ok(CallbackOutcome::Established(session))
            }
            Err(e) => Err(self.fail_sso(attempt, e.into())),
        }
    }

    /// Lists accounts waiting for approval. Admin only.
    #[instrument(skip(self))]
    pub async fn pending_accounts(&self) -> ilm_core::Result<Vec<Identity>, AuthError> {
        self.gate
            .require_admin("list pending accounts")
            .map_err(AuthError::from)?;
        let accounts = self
            .session
            .authorized(|token| async move { self.directory.pending_accounts(&token).await })
            .await
            .map_err(AuthError::from)?;
        Ok(accounts)
    }

    /// Approves an account with the given role. Admin only.
    #[instrument(skip(self, user_id), fields(user_id = %user_id))]
    pub async fn approve_account(
        &self,
        user_id: &UserId,
        role: Role,
    ) -> ilm_core::Result<Identity, AuthError> {
        let admin = self
            .gate
            .require_admin("approve accounts")
            .map_err(AuthError::from)?;
        let identity = self
            .session
            .authorized(|token| async move {
                self.directory.approve_account(&token, user_id, role).await
            })
            .await
            .map_err(AuthError::from)?;
        info!(approved_by = %admin.id(), "account approved");
        Ok(identity)
    }

    fn fail_sso(&self, attempt: &SsoAttempt, error: AuthError) -> Report<AuthError> {
        attempt.fail();
        warn!(error = %error, "sso login failed");
        self.session.clear_with_notice(Some(error.to_string()));
        error.into()
    }
}

/// Refuses identities that may not hold a session.
fn check_standing(identity: &Identity) -> Result<(), AuthenticationError> {
    if !identity.is_active() {
        return Err(AuthenticationError::AccountInactive { message: None });
    }
    if !identity.is_approved() && !identity.role().is_admin() {
        return Err(AuthenticationError::PendingApproval { message: None });
    }
    Ok(())
}

/// Accepts `local@host.tld` with no whitespace.
fn looks_like_email(email: &str) -> bool {
    if email.contains(char::is_whitespace) {
        return false;
    }
    email.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty()
            && domain
                .split_once('.')
                .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
    })
}

fn missing_field(field: &'static str) -> Report<AuthError> {
    AuthError::Validation(ValidationError::MissingField { field }).into()
}

/// Maps failures of unauthenticated credential calls.
fn credential_error(e: RemoteError) -> AuthError {
    match e {
        RemoteError::Unauthorized { message } => {
            AuthenticationError::InvalidCredentials { message }.into()
        }
        RemoteError::Forbidden { message } => AuthenticationError::PendingApproval { message }.into(),
        e if e.is_inactive_account() => AuthenticationError::AccountInactive {
            message: Some(e.message()),
        }
        .into(),
        other => other.into(),
    }
}
