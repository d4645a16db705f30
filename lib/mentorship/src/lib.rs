//! Mentor request approval workflow for the ILM platform.
//!
//! An intern or scrum master asks another intern to be their mentor. The
//! request stays pending until an approver (admin or scrum master) decides
//! it once. Mentorships are not stored; they are folded from the approved
//! requests.

pub mod error;
pub mod request;
pub mod store;
pub mod summary;
pub mod workflow;

// Re-export main types at crate root
pub use error::{ConflictError, MentorshipError};
pub use request::{Counterpart, Decision, MentorRequest, MentorRequestStatus, newest_first};
pub use store::RemoteWorkflowStore;
pub use summary::MentorshipSummary;
pub use workflow::MentorWorkflow;
