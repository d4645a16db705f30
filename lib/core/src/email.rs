//! Email address normalisation.

/// Normalises an email address for lookup and transmission.
///
/// The backing API stores addresses lowercased and trimmed, so every address
/// the client sends goes through here first.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
