//! Error types for the platform-access crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `AuthenticationError`: who the caller is could not be established
//! - `AuthorizationError`: the caller's role lacks a capability
//! - `ValidationError`: input rejected before anything is sent
//! - `RemoteError`: the backing API failed or answered with an error
//! - `SessionStoreError`: durable client storage failed
//! - `AuthError`: what `IdentityProvider` operations report

use ilm_core::UserId;
use std::fmt;

/// Errors from authentication operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticationError {
    /// Email or password rejected by the backing API.
    InvalidCredentials { message: Option<String> },
    /// The account exists but has not been approved by an admin yet.
    PendingApproval { message: Option<String> },
    /// The account has been deactivated by an admin.
    AccountInactive { message: Option<String> },
    /// No session is established.
    NotAuthenticated,
    /// The backing API rejected the session token.
    SessionExpired { message: Option<String> },
    /// The canonical profile could not be fetched after token acquisition.
    ProfileUnavailable { reason: String },
    /// The SSO identity provider reported an error on return.
    ProviderError { reason: String },
    /// The SSO return carried no state, or a state that was not issued.
    StateMismatch,
    /// The SSO return carried neither a code nor an error.
    MissingCode,
}

impl fmt::Display for AuthenticationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCredentials { message } => {
                write!(
                    f,
                    "{}",
                    message.as_deref().unwrap_or("Invalid email or password")
                )
            }
            Self::PendingApproval { message } => {
                write!(
                    f,
                    "{}",
                    message
                        .as_deref()
                        .unwrap_or("Your account is pending admin approval")
                )
            }
            Self::AccountInactive { message } => {
                write!(
                    f,
                    "{}",
                    message
                        .as_deref()
                        .unwrap_or("Your account has been deactivated")
                )
            }
            Self::NotAuthenticated => write!(f, "not authenticated"),
            Self::SessionExpired { message } => match message {
                Some(message) => write!(f, "session expired: {message}"),
                None => write!(f, "session expired"),
            },
            Self::ProfileUnavailable { reason } => {
                write!(f, "failed to fetch profile: {reason}")
            }
            Self::ProviderError { reason } => write!(f, "{reason}"),
            Self::StateMismatch => {
                write!(f, "sign-in state did not match; please try again")
            }
            Self::MissingCode => {
                write!(f, "No authorization code received from the identity provider")
            }
        }
    }
}

impl std::error::Error for AuthenticationError {}

/// Errors from authorization operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationError {
    /// User is not authenticated.
    NotAuthenticated,
    /// User lacks required permission.
    PermissionDenied { user_id: UserId, action: String },
}

impl fmt::Display for AuthorizationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAuthenticated => {
                write!(f, "user is not authenticated")
            }
            Self::PermissionDenied { user_id, action } => {
                write!(f, "user {user_id} lacks permission to {action}")
            }
        }
    }
}

impl std::error::Error for AuthorizationError {}

/// Input rejected before any remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field was empty.
    MissingField { field: &'static str },
    /// A role name that does not map to a known role.
    UnknownRole { value: String },
    /// A field whose value is not one of the accepted forms.
    InvalidValue { field: &'static str, value: String },
    /// A user tried to pick themselves as their mentor.
    SelfMentorship,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField { field } => write!(f, "{field} is required"),
            Self::UnknownRole { value } => write!(f, "unknown role '{value}'"),
            Self::InvalidValue { field, value } => write!(f, "invalid {field} '{value}'"),
            Self::SelfMentorship => write!(f, "Cannot request yourself as mentor"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Failure reported by, or while talking to, the backing API.
///
/// `message` is the upstream-provided explanation when one was present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// 401: the token (or credentials) were not accepted.
    Unauthorized { message: Option<String> },
    /// 403: the API refused the operation for this caller.
    Forbidden { message: Option<String> },
    /// 404: the addressed resource does not exist.
    NotFound { message: Option<String> },
    /// 409: a conditional write lost against the stored state.
    Conflict { message: Option<String> },
    /// Any other 4xx.
    Rejected { status: u16, message: Option<String> },
    /// 5xx, timeouts and connection failures.
    Unavailable {
        status: Option<u16>,
        message: Option<String>,
    },
    /// The response body did not match the expected schema.
    Malformed {
        operation: &'static str,
        reason: String,
    },
}

impl RemoteError {
    /// Returns the upstream message, or a generic one for the category.
    #[must_use]
    pub fn message(&self) -> String {
        let upstream = match self {
            Self::Unauthorized { message }
            | Self::Forbidden { message }
            | Self::NotFound { message }
            | Self::Conflict { message }
            | Self::Rejected { message, .. }
            | Self::Unavailable { message, .. } => message.clone(),
            Self::Malformed { .. } => None,
        };
        upstream.unwrap_or_else(|| self.generic_message().to_string())
    }

    /// Returns the HTTP status behind this error, if there was one.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { .. } => Some(401),
            Self::Forbidden { .. } => Some(403),
            Self::NotFound { .. } => Some(404),
            Self::Conflict { .. } => Some(409),
            Self::Rejected { status, .. } => Some(*status),
            Self::Unavailable { status, .. } => *status,
            Self::Malformed { .. } => None,
        }
    }

    /// Whether the API refused the caller because their account is
    /// deactivated. The API answers this with a 400 whose detail names it.
    #[must_use]
    pub fn is_inactive_account(&self) -> bool {
        match self {
            Self::Rejected {
                status: 400,
                message: Some(message),
            } => {
                let message = message.to_lowercase();
                message.contains("inactive") || message.contains("deactivated")
            }
            _ => false,
        }
    }

    fn generic_message(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => "Not authenticated",
            Self::Forbidden { .. } => "Not authorized",
            Self::NotFound { .. } => "Not found",
            Self::Conflict { .. } => "Conflicting update",
            Self::Rejected { .. } => "Request failed",
            Self::Unavailable { .. } => "Service unavailable",
            Self::Malformed { .. } => "Unexpected response from server",
        }
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed { operation, reason } => {
                write!(f, "malformed response to {operation}: {reason}")
            }
            _ => write!(f, "{}", self.message()),
        }
    }
}

impl std::error::Error for RemoteError {}

/// Errors from durable session storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStoreError {
    /// Reading or writing the storage location failed.
    Io { location: String, reason: String },
    /// The stored document could not be decoded.
    Corrupt { reason: String },
}

impl fmt::Display for SessionStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { location, reason } => {
                write!(f, "session storage at '{location}' failed: {reason}")
            }
            Self::Corrupt { reason } => write!(f, "stored session is corrupt: {reason}"),
        }
    }
}

impl std::error::Error for SessionStoreError {}

/// Failure of a call made through `SessionManager::authorized`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCallError {
    /// No session, or the session was rejected and has been cleared.
    Authentication(AuthenticationError),
    /// Any other remote failure; the session is untouched.
    Remote(RemoteError),
}

impl fmt::Display for SessionCallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authentication(e) => write!(f, "{e}"),
            Self::Remote(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for SessionCallError {}

/// Errors reported by `IdentityProvider` operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    Authentication(AuthenticationError),
    Authorization(AuthorizationError),
    Validation(ValidationError),
    Remote(RemoteError),
    Storage(SessionStoreError),
    /// SSO settings are missing or invalid.
    Configuration { reason: String },
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authentication(e) => write!(f, "{e}"),
            Self::Authorization(e) => write!(f, "{e}"),
            Self::Validation(e) => write!(f, "{e}"),
            Self::Remote(e) => write!(f, "{e}"),
            Self::Storage(e) => write!(f, "{e}"),
            Self::Configuration { reason } => write!(f, "SSO configuration error: {reason}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<AuthenticationError> for AuthError {
    fn from(e: AuthenticationError) -> Self {
        Self::Authentication(e)
    }
}

impl From<AuthorizationError> for AuthError {
    fn from(e: AuthorizationError) -> Self {
        match e {
            AuthorizationError::NotAuthenticated => {
                Self::Authentication(AuthenticationError::NotAuthenticated)
            }
            other => Self::Authorization(other),
        }
    }
}

impl From<ValidationError> for AuthError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

impl From<RemoteError> for AuthError {
    fn from(e: RemoteError) -> Self {
        Self::Remote(e)
    }
}

impl From<SessionStoreError> for AuthError {
    fn from(e: SessionStoreError) -> Self {
        Self::Storage(e)
    }
}

impl From<SessionCallError> for AuthError {
    fn from(e: SessionCallError) -> Self {
        match e {
            SessionCallError::Authentication(e) => Self::Authentication(e),
            SessionCallError::Remote(e) => Self::Remote(e),
        }
    }
}
