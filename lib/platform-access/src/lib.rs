//! Sessions, identity and role-based access for the ILM platform.
//!
//! This crate provides:
//! - Roles and the capabilities they carry (`Role`, `AuthorizationGate`)
//! - The single client session and its persistence (`SessionManager`, `SessionStore`)
//! - Credential login, registration and SSO completion (`IdentityProvider`)
//! - The SSO authorization-code state machine (`SsoAttempt`)
//! - The identity contract of the backing API (`RemoteDirectory`)
//!
//! # Session model
//!
//! A client holds at most one session. It is created by `IdentityProvider`
//! on a successful login and removed by logout or when the backing API
//! rejects its token. Accounts awaiting admin approval cannot sign in, so
//! they never hold a session.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use ilm_core::UserId;
//! use ilm_platform_access::{
//!     AccessToken, Identity, MemorySessionStore, NavigationLog, Role, SessionManager,
//! };
//!
//! let session = SessionManager::new(
//!     Arc::new(MemorySessionStore::new()),
//!     Arc::new(NavigationLog::new()),
//! );
//! let identity = Identity::new(
//!     UserId::new("u-1").expect("valid id"),
//!     "Alice".to_string(),
//!     "alice@example.com".to_string(),
//!     Role::Intern,
//! );
//! session
//!     .establish(identity.clone(), AccessToken::new("token"))
//!     .expect("memory store never fails");
//!
//! assert_eq!(session.current(), Some(identity));
//! session.clear();
//! assert_eq!(session.current(), None);
//! ```

pub mod directory;
pub mod error;
pub mod gate;
pub mod identity;
pub mod navigation;
pub mod provider;
pub mod role;
pub mod session;
pub mod sso;
pub mod store;

// Re-export main types at crate root
pub use directory::{AuthorizationCode, Credentials, Registration, RemoteDirectory, SsoGrant};
pub use error::{
    AuthError, AuthenticationError, AuthorizationError, RemoteError, SessionCallError,
    SessionStoreError, ValidationError,
};
pub use gate::AuthorizationGate;
pub use identity::Identity;
pub use navigation::{Destination, NavigationLog, Navigator};
pub use provider::IdentityProvider;
pub use role::Role;
pub use session::{AccessToken, Session, SessionManager};
pub use sso::{CallbackOutcome, SsoAttempt, SsoCallback, SsoConfig, SsoConfigBuilder, SsoPhase};
pub use store::{FileSessionStore, MemorySessionStore, SessionStore};
