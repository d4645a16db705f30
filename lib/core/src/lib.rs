//! Core domain types and utilities for the ILM platform.
//!
//! This crate provides the identifier types, error handling alias, and small
//! shared helpers used by the access, mentorship and remote crates.

pub mod email;
pub mod error;
pub mod id;

pub use email::normalize_email;
pub use error::Result;
pub use id::{MentorRequestId, ParseIdError, UserId};
