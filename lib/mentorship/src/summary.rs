//! Mentorship view derived from approved requests.

use crate::request::{Counterpart, MentorRequest, MentorRequestStatus};
use ilm_core::UserId;
use serde::{Deserialize, Serialize};

/// A user's mentor and mentees.
///
/// Never stored; always folded from the approved requests that involve
/// the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentorshipSummary {
    mentor: Option<Counterpart>,
    mentees: Vec<Counterpart>,
}

impl MentorshipSummary {
    #[must_use]
    pub fn new(mentor: Option<Counterpart>, mentees: Vec<Counterpart>) -> Self {
        Self { mentor, mentees }
    }

    /// Folds the approved requests involving `user_id`.
    ///
    /// The mentor is the counterpart of the most recently decided approved
    /// request the user made. Mentees are the distinct requesters of
    /// approved requests naming the user as mentor, most recent first.
    #[must_use]
    pub fn fold(user_id: &UserId, requests: &[MentorRequest]) -> Self {
        let mut approved: Vec<&MentorRequest> = requests
            .iter()
            .filter(|r| r.status() == MentorRequestStatus::Approved)
            .collect();
        approved.sort_by(|a, b| {
            b.updated_at()
                .cmp(&a.updated_at())
                .then_with(|| b.created_at().cmp(&a.created_at()))
                .then_with(|| b.id().cmp(a.id()))
        });

        let mentor = approved
            .iter()
            .find(|r| r.requester().user_id() == user_id)
            .map(|r| r.mentor().clone());

        let mut mentees: Vec<Counterpart> = Vec::new();
        for request in approved.iter().filter(|r| r.mentor().user_id() == user_id) {
            let requester = request.requester();
            if !mentees.iter().any(|m| m.user_id() == requester.user_id()) {
                mentees.push(requester.clone());
            }
        }

        Self { mentor, mentees }
    }

    #[must_use]
    pub fn mentor(&self) -> Option<&Counterpart> {
        self.mentor.as_ref()
    }

    #[must_use]
    pub fn mentees(&self) -> &[Counterpart] {
        &self.mentees
    }

    /// Returns true if `user_id` is among the mentees.
    #[must_use]
    pub fn has_mentee(&self, user_id: &UserId) -> bool {
        self.mentees.iter().any(|m| m.user_id() == user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Decision;
    use chrono::{DateTime, Duration, Utc};
    use ilm_core::MentorRequestId;

    fn person(id: &str) -> Counterpart {
        Counterpart::new(
            UserId::new(id).expect("valid"),
            id.to_string(),
            format!("{id}@example.com"),
        )
    }

    fn uid(id: &str) -> UserId {
        UserId::new(id).expect("valid")
    }

    fn decided(
        id: &str,
        requester: &str,
        mentor: &str,
        decision: Option<Decision>,
        opened: DateTime<Utc>,
        decided_at: DateTime<Utc>,
    ) -> MentorRequest {
        let mut request = MentorRequest::open(
            MentorRequestId::new(id).expect("valid"),
            person(requester),
            person(mentor),
            opened,
        )
        .expect("open");
        if let Some(decision) = decision {
            request
                .decide(decision, "admin".to_string(), decided_at)
                .expect("decide");
        }
        request
    }

    #[test]
    fn empty_history_has_no_mentorship() {
        let summary = MentorshipSummary::fold(&uid("a"), &[]);
        assert_eq!(summary, MentorshipSummary::default());
    }

    #[test]
    fn approved_request_links_both_sides() {
        let now = Utc::now();
        let requests = vec![decided("r-1", "a", "b", Some(Decision::Approved), now, now)];

        let for_a = MentorshipSummary::fold(&uid("a"), &requests);
        assert_eq!(for_a.mentor().map(|m| m.user_id().as_str()), Some("b"));
        assert!(for_a.mentees().is_empty());

        let for_b = MentorshipSummary::fold(&uid("b"), &requests);
        assert_eq!(for_b.mentor(), None);
        assert!(for_b.has_mentee(&uid("a")));
    }

    #[test]
    fn pending_and_rejected_are_ignored() {
        let now = Utc::now();
        let requests = vec![
            decided("r-1", "a", "b", None, now, now),
            decided("r-2", "a", "c", Some(Decision::Rejected), now, now),
        ];
        let summary = MentorshipSummary::fold(&uid("a"), &requests);
        assert_eq!(summary.mentor(), None);
    }

    #[test]
    fn most_recent_approval_wins() {
        let t0 = Utc::now();
        let requests = vec![
            // Opened later but approved earlier.
            decided(
                "r-1",
                "a",
                "b",
                Some(Decision::Approved),
                t0 + Duration::hours(1),
                t0 + Duration::hours(2),
            ),
            decided(
                "r-2",
                "a",
                "c",
                Some(Decision::Approved),
                t0,
                t0 + Duration::hours(3),
            ),
        ];
        let summary = MentorshipSummary::fold(&uid("a"), &requests);
        assert_eq!(summary.mentor().map(|m| m.user_id().as_str()), Some("c"));
    }

    #[test]
    fn mentees_are_distinct() {
        let now = Utc::now();
        let requests = vec![
            decided("r-1", "a", "m", Some(Decision::Approved), now, now),
            decided(
                "r-2",
                "a",
                "m",
                Some(Decision::Approved),
                now + Duration::minutes(1),
                now + Duration::minutes(1),
            ),
            decided("r-3", "x", "m", Some(Decision::Approved), now, now),
        ];
        let summary = MentorshipSummary::fold(&uid("m"), &requests);
        assert_eq!(summary.mentees().len(), 2);
        assert_eq!(summary.mentees()[0].user_id().as_str(), "a");
    }
}
