//! `ilm`: command-line client for the ILM intern management platform.

mod callback;
mod config;
mod error;

use crate::config::CliConfig;
use crate::error::CliError;
use ilm_core::{MentorRequestId, UserId};
use ilm_mentorship::{Decision, MentorRequest, MentorWorkflow, MentorshipSummary};
use ilm_platform_access::{
    AuthError, AuthenticationError, Destination, FileSessionStore, Identity, IdentityProvider,
    Navigator, Role, SessionManager, SsoAttempt, ValidationError,
};
use ilm_remote::HttpRemote;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Reports navigation as a line on stdout.
struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn navigate(&self, destination: Destination) {
        match destination {
            Destination::Login { notice: Some(notice) } => {
                println!("{notice}");
            }
            Destination::Login { notice: None } => println!("Signed out."),
            Destination::Landing(role) => println!("Signed in as {role} ({}).", role.landing_path()),
        }
    }
}

/// Services shared by all commands.
struct App {
    provider: Arc<IdentityProvider>,
    workflow: MentorWorkflow,
    config: CliConfig,
}

impl App {
    fn new(config: CliConfig) -> Result<Self, CliError> {
        let remote = Arc::new(HttpRemote::new(
            config.api.base_url.clone(),
            config.api.timeout(),
        )?);
        let session = Arc::new(SessionManager::load(
            Arc::new(FileSessionStore::new(config.storage.session_file.clone())),
            Arc::new(TerminalNavigator),
        ));
        let provider = Arc::new(IdentityProvider::new(remote.clone(), session.clone()));
        let workflow = MentorWorkflow::new(session, remote.clone(), remote);
        Ok(Self {
            provider,
            workflow,
            config,
        })
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &[String]) -> Result<(), CliError> {
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    if args.is_empty() || matches!(args[0], "help" | "-h" | "--help") {
        println!("{}", error::USAGE);
        return Ok(());
    }

    let config = CliConfig::load()?;
    tracing::debug!(base_url = %config.api.base_url, "loaded configuration");
    let app = App::new(config)?;

    match args.as_slice() {
        ["login", email, password] => {
            app.provider.login(email, password).await?;
        }
        ["logout"] => app.provider.logout(),
        ["whoami"] => match app.provider.restore().await? {
            Some(identity) => print_identity(&identity),
            None => println!("Not signed in."),
        },
        ["register", name, email, password, role] => {
            let identity = app.provider.register(name, email, password, role).await?;
            if identity.is_approved() {
                println!("Registered {}. You can sign in now.", identity.email());
            } else {
                println!(
                    "Registered {}. The account is pending admin approval.",
                    identity.email()
                );
            }
        }
        ["password-reset", email] => {
            app.provider.request_password_reset(email).await?;
            println!("A password reset link has been sent to {}.", email.trim());
        }
        ["sso"] => sso(&app).await?,
        ["mentor", "request", mentor_id] => {
            let request = app.workflow.request_mentor(mentor_id).await?;
            println!("Requested {} as mentor.", request.mentor().name());
            print_request(&request);
        }
        ["mentor", "mine"] => print_requests(&app.workflow.list_mine().await?),
        ["mentor", "pending"] => print_requests(&app.workflow.list_pending().await?),
        ["mentor", "approve", request_id] => decide(&app, request_id, Decision::Approved).await?,
        ["mentor", "reject", request_id] => decide(&app, request_id, Decision::Rejected).await?,
        ["mentor", "summary"] => print_summary(&app.workflow.my_mentorships().await?),
        ["mentor", "candidates"] => {
            for identity in app.workflow.mentor_candidates().await? {
                print_identity(&identity);
            }
        }
        ["accounts", "pending"] => {
            let accounts = app.provider.pending_accounts().await?;
            if accounts.is_empty() {
                println!("No accounts awaiting approval.");
            }
            for identity in accounts {
                print_identity(&identity);
            }
        }
        ["accounts", "approve", user_id, role] => {
            let user_id = UserId::new(*user_id).map_err(|_| invalid("user_id", user_id))?;
            let role: Role = role.parse().map_err(AuthError::from).map_err(CliError::Auth)?;
            let identity = app.provider.approve_account(&user_id, role).await?;
            println!("Approved {} as {}.", identity.email(), identity.role());
        }
        _ => {
            return Err(CliError::Usage(format!(
                "unrecognized command: {}",
                args.join(" ")
            )));
        }
    }
    Ok(())
}

async fn sso(app: &App) -> Result<(), CliError> {
    let config = app.config.sso.as_ref().ok_or(CliError::SsoNotConfigured)?;
    let attempt = SsoAttempt::begin(config).map_err(CliError::Auth)?;

    println!(
        "Open this URL in your browser to sign in:\n\n  {}\n",
        attempt.authorization_url()
    );
    callback::await_callback(app.provider.clone(), attempt, config.redirect_uri()).await?;

    if app.provider.session().current().is_none() {
        return Err(CliError::Auth(AuthError::Authentication(
            AuthenticationError::NotAuthenticated,
        )));
    }
    Ok(())
}

async fn decide(app: &App, request_id: &str, decision: Decision) -> Result<(), CliError> {
    let request_id =
        MentorRequestId::new(request_id).map_err(|_| invalid("request_id", request_id))?;
    let request = app.workflow.decide(&request_id, decision).await?;
    println!("Request {} is now {}.", request.id(), request.status());
    Ok(())
}

fn invalid(field: &'static str, value: &str) -> CliError {
    CliError::Auth(AuthError::Validation(ValidationError::InvalidValue {
        field,
        value: value.to_string(),
    }))
}

fn print_identity(identity: &Identity) {
    println!(
        "{}\t{}\t{}\t{}",
        identity.id(),
        identity.display_name(),
        identity.email(),
        identity.role()
    );
}

fn print_request(request: &MentorRequest) {
    println!(
        "{}\t{} -> {}\t{}\t{}",
        request.id(),
        request.requester().name(),
        request.mentor().name(),
        request.status(),
        request.created_at().format("%Y-%m-%d %H:%M")
    );
}

fn print_requests(requests: &[MentorRequest]) {
    if requests.is_empty() {
        println!("No mentor requests.");
    }
    for request in requests {
        print_request(request);
    }
}

fn print_summary(summary: &MentorshipSummary) {
    match summary.mentor() {
        Some(mentor) => println!("Mentor: {} <{}>", mentor.name(), mentor.email()),
        None => println!("Mentor: none"),
    }
    if summary.mentees().is_empty() {
        println!("Mentees: none");
    } else {
        println!("Mentees:");
        for mentee in summary.mentees() {
            println!("  {} <{}>", mentee.name(), mentee.email());
        }
    }
}
