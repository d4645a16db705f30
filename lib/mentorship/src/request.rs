//! Mentor requests and their status transitions.
//!
//! A request starts `Pending` and is decided exactly once, into either
//! `Approved` or `Rejected`. Both are terminal. Requests are never deleted.

use crate::error::ConflictError;
use chrono::{DateTime, Utc};
use ilm_core::{MentorRequestId, UserId};
use ilm_platform_access::{Identity, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status of a mentor request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MentorRequestStatus {
    /// Waiting for an approver.
    Pending,
    /// Approved; the mentorship is in effect.
    Approved,
    /// Rejected.
    Rejected,
}

impl MentorRequestStatus {
    /// Returns true if this is a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for MentorRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An approver's decision on a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approved,
    Rejected,
}

impl Decision {
    /// The status a request takes on when this decision is applied.
    #[must_use]
    pub fn status(&self) -> MentorRequestStatus {
        match self {
            Self::Approved => MentorRequestStatus::Approved,
            Self::Rejected => MentorRequestStatus::Rejected,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.status().as_str())
    }
}

impl FromStr for Decision {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "approve" | "approved" => Ok(Self::Approved),
            "reject" | "rejected" => Ok(Self::Rejected),
            _ => Err(ValidationError::InvalidValue {
                field: "decision",
                value: s.to_string(),
            }),
        }
    }
}

/// Snapshot of a user as recorded on a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counterpart {
    user_id: UserId,
    name: String,
    email: String,
}

impl Counterpart {
    #[must_use]
    pub fn new(user_id: UserId, name: String, email: String) -> Self {
        Self {
            user_id,
            name,
            email,
        }
    }

    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }
}

impl From<&Identity> for Counterpart {
    fn from(identity: &Identity) -> Self {
        Self::new(
            identity.id().clone(),
            identity.display_name().to_string(),
            identity.email().to_string(),
        )
    }
}

/// A request by one user to be mentored by another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentorRequest {
    id: MentorRequestId,
    requester: Counterpart,
    mentor: Counterpart,
    status: MentorRequestStatus,
    /// Who decided the request, as reported by the backing API.
    approved_by: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl MentorRequest {
    /// Opens a pending request.
    ///
    /// Fails if requester and mentor are the same user.
    pub fn open(
        id: MentorRequestId,
        requester: Counterpart,
        mentor: Counterpart,
        at: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        if requester.user_id() == mentor.user_id() {
            return Err(ValidationError::SelfMentorship);
        }
        Ok(Self {
            id,
            requester,
            mentor,
            status: MentorRequestStatus::Pending,
            approved_by: None,
            created_at: at,
            updated_at: at,
        })
    }

    /// Reconstitutes a request from stored or transmitted fields.
    ///
    /// Fails if requester and mentor are the same user.
    pub fn with_all_fields(
        id: MentorRequestId,
        requester: Counterpart,
        mentor: Counterpart,
        status: MentorRequestStatus,
        approved_by: Option<String>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        if requester.user_id() == mentor.user_id() {
            return Err(ValidationError::SelfMentorship);
        }
        Ok(Self {
            id,
            requester,
            mentor,
            status,
            approved_by,
            created_at,
            updated_at,
        })
    }

    #[must_use]
    pub fn id(&self) -> &MentorRequestId {
        &self.id
    }

    #[must_use]
    pub fn requester(&self) -> &Counterpart {
        &self.requester
    }

    #[must_use]
    pub fn mentor(&self) -> &Counterpart {
        &self.mentor
    }

    #[must_use]
    pub fn status(&self) -> MentorRequestStatus {
        self.status
    }

    #[must_use]
    pub fn approved_by(&self) -> Option<&str> {
        self.approved_by.as_deref()
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == MentorRequestStatus::Pending
    }

    /// Applies a decision. Only a pending request can be decided.
    pub fn decide(
        &mut self,
        decision: Decision,
        decided_by: String,
        at: DateTime<Utc>,
    ) -> Result<(), ConflictError> {
        if self.status.is_terminal() {
            return Err(ConflictError::AlreadyDecided {
                request_id: self.id.clone(),
                status: Some(self.status),
            });
        }
        self.status = decision.status();
        self.approved_by = Some(decided_by);
        self.updated_at = at;
        Ok(())
    }
}

/// Orders requests newest first.
pub fn newest_first(requests: &mut [MentorRequest]) {
    requests.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn person(id: &str) -> Counterpart {
        Counterpart::new(
            UserId::new(id).expect("valid"),
            id.to_uppercase(),
            format!("{id}@example.com"),
        )
    }

    fn request(id: &str, at: DateTime<Utc>) -> MentorRequest {
        MentorRequest::open(
            MentorRequestId::new(id).expect("valid"),
            person("a"),
            person("b"),
            at,
        )
        .expect("open")
    }

    #[test]
    fn open_is_pending() {
        let request = request("r-1", Utc::now());
        assert!(request.is_pending());
        assert_eq!(request.approved_by(), None);
        assert_eq!(request.created_at(), request.updated_at());
    }

    #[test]
    fn open_rejects_self_mentorship() {
        let result = MentorRequest::open(
            MentorRequestId::new("r-1").expect("valid"),
            person("a"),
            person("a"),
            Utc::now(),
        );
        assert_eq!(result, Err(ValidationError::SelfMentorship));
    }

    #[test]
    fn decide_sets_status_and_decider() {
        let opened = Utc::now();
        let mut request = request("r-1", opened);
        let decided = opened + Duration::minutes(5);

        request
            .decide(Decision::Approved, "c".to_string(), decided)
            .expect("decide");

        assert_eq!(request.status(), MentorRequestStatus::Approved);
        assert_eq!(request.approved_by(), Some("c"));
        assert_eq!(request.updated_at(), decided);
    }

    #[test]
    fn decide_twice_conflicts_and_keeps_state() {
        let mut request = request("r-1", Utc::now());
        request
            .decide(Decision::Approved, "c".to_string(), Utc::now())
            .expect("first decide");
        let before = request.clone();

        let err = request
            .decide(Decision::Rejected, "d".to_string(), Utc::now())
            .unwrap_err();

        assert_eq!(
            err,
            ConflictError::AlreadyDecided {
                request_id: MentorRequestId::new("r-1").expect("valid"),
                status: Some(MentorRequestStatus::Approved),
            }
        );
        assert_eq!(request, before);
    }

    #[test]
    fn decided_request_refuses_every_second_decision() {
        for first in [Decision::Approved, Decision::Rejected] {
            for second in [Decision::Approved, Decision::Rejected] {
                let mut request = request("r-1", Utc::now());
                request
                    .decide(first, "c".to_string(), Utc::now())
                    .expect("first decide");
                let before = request.clone();

                let err = request
                    .decide(second, "s".to_string(), Utc::now())
                    .unwrap_err();

                assert_eq!(
                    err,
                    ConflictError::AlreadyDecided {
                        request_id: MentorRequestId::new("r-1").expect("valid"),
                        status: Some(first.status()),
                    },
                    "{first} then {second}"
                );
                assert_eq!(request, before, "{first} then {second}");
            }
        }
    }

    #[test]
    fn terminal_statuses() {
        assert!(!MentorRequestStatus::Pending.is_terminal());
        assert!(MentorRequestStatus::Approved.is_terminal());
        assert!(MentorRequestStatus::Rejected.is_terminal());
    }

    #[test]
    fn decision_parses_verbs_and_statuses() {
        assert_eq!("approve".parse::<Decision>(), Ok(Decision::Approved));
        assert_eq!("Rejected".parse::<Decision>(), Ok(Decision::Rejected));
        assert!("maybe".parse::<Decision>().is_err());
    }

    #[test]
    fn newest_first_orders_by_creation() {
        let now = Utc::now();
        let mut requests = vec![
            request("r-old", now - Duration::hours(2)),
            request("r-new", now),
            request("r-mid", now - Duration::hours(1)),
        ];
        newest_first(&mut requests);
        let ids: Vec<_> = requests.iter().map(|r| r.id().as_str().to_string()).collect();
        assert_eq!(ids, vec!["r-new", "r-mid", "r-old"]);
    }

    #[test]
    fn status_serialization_format() {
        let json = serde_json::to_string(&MentorRequestStatus::Approved).expect("serialize");
        assert_eq!(json, "\"approved\"");
    }
}
