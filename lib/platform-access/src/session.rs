//! Session lifecycle for the single client session.
//!
//! A session binds the client to an [`Identity`] through a bearer token.
//! Expiry is not tracked locally: it is discovered when the backing API
//! rejects the token, and [`SessionManager::authorized`] is the one place
//! that reacts to that rejection.

use crate::error::{AuthenticationError, RemoteError, SessionCallError, SessionStoreError};
use crate::identity::Identity;
use crate::navigation::{Destination, Navigator};
use crate::store::SessionStore;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Opaque bearer credential issued by the backing API.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token for attaching to a request.
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken([redacted])")
    }
}

/// An established session.
///
/// Serialized as the persisted document: `ilm_token` and `ilm_user` are
/// always present together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "ilm_user")]
    identity: Identity,
    #[serde(rename = "ilm_token")]
    token: AccessToken,
    issued_at: DateTime<Utc>,
}

impl Session {
    /// Creates a session issued now.
    #[must_use]
    pub fn new(identity: Identity, token: AccessToken) -> Self {
        Self {
            identity,
            token,
            issued_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    #[must_use]
    pub fn token(&self) -> &AccessToken {
        &self.token
    }

    #[must_use]
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }
}

/// Owns the current session and its persistence.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    navigator: Arc<dyn Navigator>,
    current: RwLock<Option<Session>>,
}

impl SessionManager {
    /// Creates a manager with no session, regardless of what is stored.
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            store,
            navigator,
            current: RwLock::new(None),
        }
    }

    /// Creates a manager seeded from the persisted session.
    ///
    /// An unreadable document is treated as no session. The seeded identity
    /// is a cached snapshot; `IdentityProvider::restore` revalidates it.
    #[must_use]
    pub fn load(store: Arc<dyn SessionStore>, navigator: Arc<dyn Navigator>) -> Self {
        let persisted = match store.load() {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "discarding unreadable persisted session");
                if let Err(e) = store.clear() {
                    warn!(error = %e, "failed to discard persisted session");
                }
                None
            }
        };
        Self {
            store,
            navigator,
            current: RwLock::new(persisted),
        }
    }

    /// Persists and activates a session for `identity`.
    ///
    /// Storage is written before memory, so a storage failure leaves the
    /// client without a session.
    pub fn establish(
        &self,
        identity: Identity,
        token: AccessToken,
    ) -> Result<Session, SessionStoreError> {
        let session = Session::new(identity, token);
        if let Err(e) = self.store.persist(&session) {
            self.reset();
            return Err(e);
        }
        *self.current.write() = Some(session.clone());
        info!(
            user_id = %session.identity().id(),
            role = %session.identity().role(),
            "session established"
        );
        Ok(session)
    }

    /// Returns the cached identity, if a session exists.
    #[must_use]
    pub fn current(&self) -> Option<Identity> {
        self.current
            .read()
            .as_ref()
            .map(|session| session.identity().clone())
    }

    /// Returns the whole session, if one exists.
    #[must_use]
    pub fn session(&self) -> Option<Session> {
        self.current.read().clone()
    }

    /// Returns the bearer credential for outbound calls.
    #[must_use]
    pub fn token(&self) -> Option<AccessToken> {
        self.current
            .read()
            .as_ref()
            .map(|session| session.token().clone())
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.current.read().is_some()
    }

    /// Removes the session and navigates to the login entry point.
    pub fn clear(&self) {
        self.clear_with_notice(None);
    }

    /// Like [`clear`](Self::clear), with a notice shown at the entry point.
    pub fn clear_with_notice(&self, notice: Option<String>) {
        self.reset();
        self.navigator.navigate(Destination::Login { notice });
    }

    /// Hands the landing destination for the current role to the navigator.
    pub fn navigate_to_landing(&self) {
        if let Some(identity) = self.current() {
            self.navigator.navigate(Destination::Landing(identity.role()));
        }
    }

    /// Runs an authenticated remote call with the current token.
    ///
    /// Without a session the call is not made. If the backing API rejects
    /// the token or reports the account deactivated, the session is
    /// cleared, provided it still holds that token.
    pub async fn authorized<T, F, Fut>(&self, op: F) -> Result<T, SessionCallError>
    where
        F: FnOnce(AccessToken) -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let token = self.token().ok_or(SessionCallError::Authentication(
            AuthenticationError::NotAuthenticated,
        ))?;

        match op(token.clone()).await {
            Ok(value) => Ok(value),
            Err(RemoteError::Unauthorized { message }) => {
                if self.token().as_ref() == Some(&token) {
                    info!("token rejected upstream, clearing session");
                    self.clear_with_notice(Some(
                        "Your session has expired. Please sign in again.".to_string(),
                    ));
                } else {
                    debug!("stale token rejected, current session kept");
                }
                Err(SessionCallError::Authentication(
                    AuthenticationError::SessionExpired { message },
                ))
            }
            Err(e) if e.is_inactive_account() => {
                let notice = e.message();
                if self.token().as_ref() == Some(&token) {
                    info!("account deactivated upstream, clearing session");
                    self.clear_with_notice(Some(notice.clone()));
                }
                Err(SessionCallError::Authentication(
                    AuthenticationError::AccountInactive {
                        message: Some(notice),
                    },
                ))
            }
            Err(e) => Err(SessionCallError::Remote(e)),
        }
    }

    fn reset(&self) {
        let previous = self.current.write().take();
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "failed to clear persisted session");
        }
        if let Some(session) = previous {
            debug!(user_id = %session.identity().id(), "session cleared");
        }
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("current", &*self.current.read())
            .finish_non_exhaustive()
    }
}
