//! Contract for the workflow side of the backing API.

use crate::request::{Decision, MentorRequest, MentorRequestStatus};
use crate::summary::MentorshipSummary;
use async_trait::async_trait;
use ilm_core::{MentorRequestId, UserId};
use ilm_platform_access::{AccessToken, RemoteError};

/// Mentor request storage offered by the backing API.
///
/// `decide` must be a conditional transition: it succeeds only if the
/// stored request is still pending at commit time, and reports
/// [`RemoteError::Conflict`] otherwise. Two concurrent decisions on the
/// same request can never both succeed.
#[async_trait]
pub trait RemoteWorkflowStore: Send + Sync {
    /// Creates a pending request from the token's owner to `mentor_id`.
    async fn create_request(
        &self,
        token: &AccessToken,
        mentor_id: &UserId,
    ) -> Result<MentorRequest, RemoteError>;

    /// Lists requests the token's owner takes part in, as requester or mentor.
    async fn list_mine(&self, token: &AccessToken) -> Result<Vec<MentorRequest>, RemoteError>;

    /// Lists requests system-wide, optionally by status.
    async fn list_by_status(
        &self,
        token: &AccessToken,
        status: Option<MentorRequestStatus>,
    ) -> Result<Vec<MentorRequest>, RemoteError>;

    /// Moves a pending request to a terminal status.
    async fn decide(
        &self,
        token: &AccessToken,
        request_id: &MentorRequestId,
        decision: Decision,
    ) -> Result<MentorRequest, RemoteError>;

    /// Returns the token owner's mentorship view as computed by the backend.
    async fn mentorship_summary(
        &self,
        token: &AccessToken,
    ) -> Result<MentorshipSummary, RemoteError>;
}
