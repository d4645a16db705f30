//! Wire schemas of the backing API.
//!
//! Every response is parsed into one of these types and converted into a
//! domain type before it leaves the adapter. A missing or mistyped field is
//! a `RemoteError::Malformed`, never a silently defaulted value.

use chrono::{DateTime, NaiveDateTime, Utc};
use ilm_core::{MentorRequestId, UserId};
use ilm_mentorship::{Counterpart, MentorRequest, MentorRequestStatus, MentorshipSummary};
use ilm_platform_access::{Identity, RemoteError, Role};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct RegisterRequest<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub role: &'static str,
}

#[derive(Debug, Serialize)]
pub(crate) struct ForgotPasswordRequest<'a> {
    pub email: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct SsoCallbackRequest<'a> {
    pub code: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SsoTokenResponse {
    pub access_token: String,
    pub user: UserDto,
}

#[derive(Debug, Serialize)]
pub(crate) struct ApproveAccountRequest {
    pub role: &'static str,
    pub is_approved: bool,
}

fn yes() -> bool {
    true
}

/// A user as returned by the profile, listing and admin endpoints.
#[derive(Debug, Deserialize)]
pub(crate) struct UserDto {
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    pub role: String,
    #[serde(default = "yes")]
    pub is_active: bool,
    #[serde(default = "yes")]
    pub is_approved: bool,
}

impl UserDto {
    pub fn into_identity(self, operation: &'static str) -> Result<Identity, RemoteError> {
        let id = UserId::new(self.id).map_err(|e| malformed(operation, e))?;
        let role: Role = self.role.parse().map_err(|e| malformed(operation, e))?;
        let display_name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .or(self.username)
            .unwrap_or_else(|| self.email.clone());
        Ok(Identity::new(id, display_name, self.email, role)
            .with_status(self.is_active, self.is_approved))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateMentorRequest<'a> {
    pub mentor_user_id: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct DecideRequest {
    pub status: MentorRequestStatus,
    pub expected_status: MentorRequestStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MentorRequestDto {
    #[serde(rename = "_id")]
    pub id: String,
    pub requester_user_id: String,
    pub requester_email: String,
    pub requester_name: String,
    pub mentor_user_id: String,
    pub mentor_email: String,
    pub mentor_name: String,
    pub status: MentorRequestStatus,
    #[serde(default)]
    pub approved_by: Option<String>,
    #[serde(rename = "created_at", deserialize_with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updated_at", deserialize_with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl MentorRequestDto {
    pub fn into_request(self, operation: &'static str) -> Result<MentorRequest, RemoteError> {
        let id = MentorRequestId::new(self.id).map_err(|e| malformed(operation, e))?;
        let requester = Counterpart::new(
            UserId::new(self.requester_user_id).map_err(|e| malformed(operation, e))?,
            self.requester_name,
            self.requester_email,
        );
        let mentor = Counterpart::new(
            UserId::new(self.mentor_user_id).map_err(|e| malformed(operation, e))?,
            self.mentor_name,
            self.mentor_email,
        );
        MentorRequest::with_all_fields(
            id,
            requester,
            mentor,
            self.status,
            self.approved_by,
            self.created_at,
            self.updated_at,
        )
        .map_err(|e| malformed(operation, e))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CounterpartDto {
    pub user_id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MentorshipSummaryDto {
    pub mentor: Option<CounterpartDto>,
    pub mentees: Vec<CounterpartDto>,
}

impl MentorshipSummaryDto {
    pub fn into_summary(self, operation: &'static str) -> Result<MentorshipSummary, RemoteError> {
        let convert = |dto: CounterpartDto| -> Result<Counterpart, RemoteError> {
            Ok(Counterpart::new(
                UserId::new(dto.user_id).map_err(|e| malformed(operation, e))?,
                dto.name,
                dto.email,
            ))
        };
        let mentor = self.mentor.map(convert).transpose()?;
        let mentees = self
            .mentees
            .into_iter()
            .map(convert)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(MentorshipSummary::new(mentor, mentees))
    }
}

/// Accepts RFC 3339 timestamps and offset-less ones, which are taken as UTC.
fn timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(serde::de::Error::custom)
}

/// Error body of the backing API.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<Detail>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Detail {
    Message(String),
    Items(Vec<DetailItem>),
    Other(serde_json::Value),
}

#[derive(Debug, Deserialize)]
struct DetailItem {
    msg: String,
}

/// Extracts the upstream explanation from an error body, if there is one.
///
/// `detail` is either a string or a list of `{msg}` objects, which are
/// joined with ", ".
pub(crate) fn error_message(body: &[u8]) -> Option<String> {
    let body: ErrorBody = serde_json::from_slice(body).ok()?;
    let message = match body.detail? {
        Detail::Message(message) => message,
        Detail::Items(items) => items
            .into_iter()
            .map(|item| item.msg)
            .collect::<Vec<_>>()
            .join(", "),
        Detail::Other(_) => return None,
    };
    (!message.trim().is_empty()).then_some(message)
}

pub(crate) fn malformed(operation: &'static str, e: impl std::fmt::Display) -> RemoteError {
    RemoteError::Malformed {
        operation,
        reason: e.to_string(),
    }
}
