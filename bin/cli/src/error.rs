//! Errors surfaced by the command-line client.

use ilm_mentorship::MentorshipError;
use ilm_platform_access::{AuthError, RemoteError};
use rootcause::Report;
use std::fmt;

#[derive(Debug)]
pub enum CliError {
    /// The command line could not be understood.
    Usage(String),
    /// Configuration could not be loaded.
    Config(config::ConfigError),
    /// SSO was requested but not configured.
    SsoNotConfigured,
    /// The SSO callback listener failed.
    Listener { reason: String },
    Auth(AuthError),
    Mentorship(MentorshipError),
    Remote(RemoteError),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Usage(message) => write!(f, "{message}\n\n{USAGE}"),
            Self::Config(e) => write!(f, "invalid configuration: {e}"),
            Self::SsoNotConfigured => write!(
                f,
                "single sign-on is not configured (set ILM__SSO__TENANT_ID, ILM__SSO__CLIENT_ID and ILM__SSO__REDIRECT_URI)"
            ),
            Self::Listener { reason } => write!(f, "SSO callback listener failed: {reason}"),
            Self::Auth(e) => write!(f, "{e}"),
            Self::Mentorship(e) => write!(f, "{e}"),
            Self::Remote(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for CliError {}

impl From<config::ConfigError> for CliError {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<Report<AuthError>> for CliError {
    fn from(report: Report<AuthError>) -> Self {
        Self::Auth(report.current_context().clone())
    }
}

impl From<Report<MentorshipError>> for CliError {
    fn from(report: Report<MentorshipError>) -> Self {
        Self::Mentorship(report.current_context().clone())
    }
}

impl From<RemoteError> for CliError {
    fn from(e: RemoteError) -> Self {
        Self::Remote(e)
    }
}

pub const USAGE: &str = "\
usage: ilm <command>

commands:
  login <email> <password>
  logout
  whoami
  register <name> <email> <password> <role>
  password-reset <email>
  sso
  mentor request <mentor-id>
  mentor mine
  mentor pending
  mentor approve <request-id>
  mentor reject <request-id>
  mentor summary
  mentor candidates
  accounts pending
  accounts approve <user-id> <role>";
