//! Contract for the identity side of the backing API.

use crate::error::RemoteError;
use crate::identity::Identity;
use crate::role::Role;
use crate::session::AccessToken;
use async_trait::async_trait;
use ilm_core::UserId;
pub use oauth2::AuthorizationCode;
use std::fmt;

/// Email and password for credential login.
#[derive(Clone)]
pub struct Credentials {
    email: String,
    password: String,
}

impl Credentials {
    /// Creates credentials; the email is expected to be normalized already.
    #[must_use]
    pub fn new(email: String, password: String) -> Self {
        Self { email, password }
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[redacted]")
            .finish()
    }
}

/// A self-registration request.
#[derive(Clone)]
pub struct Registration {
    name: String,
    email: String,
    password: String,
    role: Role,
}

impl Registration {
    #[must_use]
    pub fn new(name: String, email: String, password: String, role: Role) -> Self {
        Self {
            name,
            email,
            password,
            role,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"[redacted]")
            .field("role", &self.role)
            .finish()
    }
}

/// Result of exchanging an SSO authorization code.
#[derive(Debug, Clone)]
pub struct SsoGrant {
    pub token: AccessToken,
    pub identity: Identity,
}

/// Identity operations offered by the backing API.
///
/// Implementations report HTTP-level failures through [`RemoteError`] and
/// must validate response shapes before returning.
#[async_trait]
pub trait RemoteDirectory: Send + Sync {
    /// Exchanges credentials for a token.
    async fn login(&self, credentials: &Credentials) -> Result<AccessToken, RemoteError>;

    /// Returns the canonical profile for the token's owner.
    async fn profile(&self, token: &AccessToken) -> Result<Identity, RemoteError>;

    /// Creates an account, which may still need admin approval.
    async fn register(&self, registration: &Registration) -> Result<Identity, RemoteError>;

    /// Exchanges an SSO authorization code for a token and identity.
    async fn exchange_sso_code(&self, code: &AuthorizationCode) -> Result<SsoGrant, RemoteError>;

    /// Asks the API to email a password-reset link to `email`.
    async fn request_password_reset(&self, email: &str) -> Result<(), RemoteError>;

    /// Lists identities, optionally restricted to one role.
    async fn list_identities(
        &self,
        token: &AccessToken,
        role: Option<Role>,
    ) -> Result<Vec<Identity>, RemoteError>;

    /// Lists accounts awaiting approval.
    async fn pending_accounts(&self, token: &AccessToken) -> Result<Vec<Identity>, RemoteError>;

    /// Approves an account and assigns its role.
    async fn approve_account(
        &self,
        token: &AccessToken,
        user_id: &UserId,
        role: Role,
    ) -> Result<Identity, RemoteError>;
}
