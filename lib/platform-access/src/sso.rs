//! Single sign-on through an external identity provider.
//!
//! The client redirects to the provider's authorize endpoint with a random
//! `state`, receives an authorization code on return, and hands that code
//! to the backing API, which performs the token exchange.
//!
//! Each [`SsoAttempt`] walks one state machine:
//!
//! ```text
//! START -> AWAITING_CODE -> CODE_RECEIVED -> EXCHANGING -> ESTABLISHED
//!                                        \-> FAILED     \-> FAILED
//! ```
//!
//! `CODE_RECEIVED` can be entered once per attempt. Any later callback for
//! the same attempt is answered with [`CallbackOutcome::AlreadyHandled`].

use crate::error::AuthError;
use crate::session::Session;
use oauth2::basic::BasicClient;
use oauth2::{AuthUrl, AuthorizationCode, ClientId, CsrfToken, RedirectUrl, Scope};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use subtle::ConstantTimeEq;

/// Configuration for the external identity provider.
///
/// Fields with defaults can be omitted when loading from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SsoConfig {
    /// Directory (tenant) ID at the provider.
    tenant_id: String,
    /// Application (client) ID registered with the provider.
    client_id: String,
    /// Where the provider sends the user back to.
    redirect_uri: String,
    /// Provider authority base URL.
    /// Default: "https://login.microsoftonline.com"
    #[serde(default = "default_authority")]
    authority: String,
    /// Scopes to request as a comma-separated string.
    /// Default: "User.Read,openid,profile,email"
    #[serde(default = "default_scopes")]
    scopes: String,
}

fn default_authority() -> String {
    "https://login.microsoftonline.com".to_string()
}

fn default_scopes() -> String {
    "User.Read,openid,profile,email".to_string()
}

impl SsoConfig {
    /// Creates a configuration with defaults for optional fields.
    #[must_use]
    pub fn new(tenant_id: String, client_id: String, redirect_uri: String) -> Self {
        Self {
            tenant_id,
            client_id,
            redirect_uri,
            authority: default_authority(),
            scopes: default_scopes(),
        }
    }

    /// Creates a configuration builder for more customization.
    #[must_use]
    pub fn builder(tenant_id: String, client_id: String, redirect_uri: String) -> SsoConfigBuilder {
        SsoConfigBuilder::new(tenant_id, client_id, redirect_uri)
    }

    #[must_use]
    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    #[must_use]
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Returns the scopes to request, parsed from the comma-separated string.
    #[must_use]
    pub fn scopes(&self) -> Vec<&str> {
        self.scopes
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// The provider's authorize endpoint for this tenant.
    #[must_use]
    pub fn authorize_endpoint(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/authorize",
            self.authority.trim_end_matches('/'),
            self.tenant_id
        )
    }
}

/// Builder for `SsoConfig`.
#[derive(Debug)]
pub struct SsoConfigBuilder {
    tenant_id: String,
    client_id: String,
    redirect_uri: String,
    authority: String,
    scopes: Vec<String>,
}

impl SsoConfigBuilder {
    #[must_use]
    pub fn new(tenant_id: String, client_id: String, redirect_uri: String) -> Self {
        Self {
            tenant_id,
            client_id,
            redirect_uri,
            authority: default_authority(),
            scopes: default_scopes().split(',').map(str::to_string).collect(),
        }
    }

    /// Sets the provider authority base URL.
    #[must_use]
    pub fn authority(mut self, authority: String) -> Self {
        self.authority = authority;
        self
    }

    /// Sets the scopes to request.
    #[must_use]
    pub fn scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Adds a scope to the list of scopes to request.
    #[must_use]
    pub fn add_scope(mut self, scope: String) -> Self {
        if !self.scopes.contains(&scope) {
            self.scopes.push(scope);
        }
        self
    }

    #[must_use]
    pub fn build(self) -> SsoConfig {
        SsoConfig {
            tenant_id: self.tenant_id,
            client_id: self.client_id,
            redirect_uri: self.redirect_uri,
            authority: self.authority,
            scopes: self.scopes.join(","),
        }
    }
}

/// Phase of an SSO attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SsoPhase {
    Start = 0,
    AwaitingCode = 1,
    CodeReceived = 2,
    Exchanging = 3,
    Established = 4,
    Failed = 5,
}

impl SsoPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Start,
            1 => Self::AwaitingCode,
            2 => Self::CodeReceived,
            3 => Self::Exchanging,
            4 => Self::Established,
            _ => Self::Failed,
        }
    }

    /// Returns true once the attempt can no longer change.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Established | Self::Failed)
    }
}

/// Parameters the provider appends to the redirect URI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SsoCallback {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl SsoCallback {
    /// Parses callback parameters from a query string, with or without `?`.
    pub fn from_query(query: &str) -> Result<Self, serde_urlencoded::de::Error> {
        serde_urlencoded::from_str(query.trim_start_matches('?'))
    }

    /// The provider-reported error text, preferring the description.
    #[must_use]
    pub fn provider_error(&self) -> Option<&str> {
        self.error_description
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.error.as_deref().filter(|s| !s.is_empty()))
    }

    /// The authorization code, if a non-empty one was returned.
    #[must_use]
    pub fn authorization_code(&self) -> Option<AuthorizationCode> {
        self.code
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|code| AuthorizationCode::new(code.to_string()))
    }
}

/// What handling a callback produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// The code was exchanged and the session established.
    Established(Session),
    /// This attempt already received its callback; nothing was done.
    AlreadyHandled,
}

/// One SSO sign-in attempt.
pub struct SsoAttempt {
    authorization_url: String,
    csrf_token: CsrfToken,
    phase: AtomicU8,
}

impl SsoAttempt {
    /// Starts an attempt: generates a fresh `state` and the authorization URL.
    pub fn begin(config: &SsoConfig) -> Result<Self, AuthError> {
        let auth_url = AuthUrl::new(config.authorize_endpoint()).map_err(|e| {
            AuthError::Configuration {
                reason: format!("invalid authorize endpoint: {e}"),
            }
        })?;
        let redirect_url = RedirectUrl::new(config.redirect_uri().to_string()).map_err(|e| {
            AuthError::Configuration {
                reason: format!("invalid redirect URI: {e}"),
            }
        })?;
        if config.client_id().is_empty() || config.tenant_id().is_empty() {
            return Err(AuthError::Configuration {
                reason: "tenant_id and client_id are required".to_string(),
            });
        }

        let phase = AtomicU8::new(SsoPhase::Start as u8);

        let client = BasicClient::new(ClientId::new(config.client_id().to_string()))
            .set_auth_uri(auth_url)
            .set_redirect_uri(redirect_url);

        let mut request = client.authorize_url(CsrfToken::new_random);
        for scope in config.scopes() {
            request = request.add_scope(Scope::new(scope.to_string()));
        }
        request = request.add_extra_param("response_mode", "query");

        let (url, csrf_token) = request.url();
        phase.store(SsoPhase::AwaitingCode as u8, Ordering::SeqCst);

        Ok(Self {
            authorization_url: url.to_string(),
            csrf_token,
            phase,
        })
    }

    /// Where to send the user.
    #[must_use]
    pub fn authorization_url(&self) -> &str {
        &self.authorization_url
    }

    /// The `state` value issued for this attempt.
    #[must_use]
    pub fn state(&self) -> &str {
        self.csrf_token.secret()
    }

    #[must_use]
    pub fn phase(&self) -> SsoPhase {
        SsoPhase::from_u8(self.phase.load(Ordering::SeqCst))
    }

    /// Returns true if `returned` is the state issued at start.
    #[must_use]
    pub fn verify_state(&self, returned: Option<&str>) -> bool {
        match returned {
            Some(returned) => bool::from(
                returned
                    .as_bytes()
                    .ct_eq(self.csrf_token.secret().as_bytes()),
            ),
            None => false,
        }
    }

    /// Latches the callback. Only the first caller gets `true`.
    #[must_use]
    pub(crate) fn receive(&self) -> bool {
        self.transition(SsoPhase::AwaitingCode, SsoPhase::CodeReceived)
    }

    /// Moves from `from` to `to`. Returns false, leaving the phase as it
    /// was, if the attempt is not in `from`.
    #[must_use]
    pub(crate) fn transition(&self, from: SsoPhase, to: SsoPhase) -> bool {
        self.phase
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub(crate) fn fail(&self) {
        self.phase.store(SsoPhase::Failed as u8, Ordering::SeqCst);
    }
}

impl fmt::Debug for SsoAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SsoAttempt")
            .field("authorization_url", &self.authorization_url)
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}
