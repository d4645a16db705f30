//! Error types for the mentor workflow.

use crate::request::MentorRequestStatus;
use ilm_core::{MentorRequestId, UserId};
use ilm_platform_access::{
    AuthenticationError, AuthorizationError, RemoteError, SessionCallError, ValidationError,
};
use std::fmt;

/// A write that contradicts the current state of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictError {
    /// The caller already has a pending request to this mentor.
    DuplicatePending { mentor_id: UserId },
    /// The request was already approved or rejected.
    AlreadyDecided {
        request_id: MentorRequestId,
        status: Option<MentorRequestStatus>,
    },
}

impl fmt::Display for ConflictError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicatePending { mentor_id } => {
                write!(f, "a request to mentor {mentor_id} is already pending")
            }
            Self::AlreadyDecided {
                request_id,
                status: Some(status),
            } => write!(f, "mentor request {request_id} is already {status}"),
            Self::AlreadyDecided {
                request_id,
                status: None,
            } => write!(f, "mentor request {request_id} has already been decided"),
        }
    }
}

impl std::error::Error for ConflictError {}

/// Errors reported by `MentorWorkflow` operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MentorshipError {
    Authentication(AuthenticationError),
    Authorization(AuthorizationError),
    Validation(ValidationError),
    Conflict(ConflictError),
    Remote(RemoteError),
}

impl fmt::Display for MentorshipError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authentication(e) => write!(f, "{e}"),
            Self::Authorization(e) => write!(f, "{e}"),
            Self::Validation(e) => write!(f, "{e}"),
            Self::Conflict(e) => write!(f, "{e}"),
            Self::Remote(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for MentorshipError {}

impl From<AuthorizationError> for MentorshipError {
    fn from(e: AuthorizationError) -> Self {
        match e {
            AuthorizationError::NotAuthenticated => {
                Self::Authentication(AuthenticationError::NotAuthenticated)
            }
            other => Self::Authorization(other),
        }
    }
}

impl From<ValidationError> for MentorshipError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

impl From<ConflictError> for MentorshipError {
    fn from(e: ConflictError) -> Self {
        Self::Conflict(e)
    }
}

impl From<SessionCallError> for MentorshipError {
    fn from(e: SessionCallError) -> Self {
        match e {
            SessionCallError::Authentication(e) => Self::Authentication(e),
            SessionCallError::Remote(e) => Self::Remote(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_decided_names_status() {
        let err = ConflictError::AlreadyDecided {
            request_id: MentorRequestId::new("r-9").expect("valid"),
            status: Some(MentorRequestStatus::Approved),
        };
        assert_eq!(err.to_string(), "mentor request r-9 is already approved");
    }

    #[test]
    fn duplicate_pending_display() {
        let err = ConflictError::DuplicatePending {
            mentor_id: UserId::new("u-b").expect("valid"),
        };
        assert!(err.to_string().contains("u-b"));
    }

    #[test]
    fn not_authenticated_is_authentication_category() {
        let err: MentorshipError = AuthorizationError::NotAuthenticated.into();
        assert_eq!(
            err,
            MentorshipError::Authentication(AuthenticationError::NotAuthenticated)
        );
    }

    #[test]
    fn remote_message_passes_through() {
        let err: MentorshipError = SessionCallError::Remote(RemoteError::Rejected {
            status: 400,
            message: Some("Mentor must be an intern".to_string()),
        })
        .into();
        assert_eq!(err.to_string(), "Mentor must be an intern");
    }
}
