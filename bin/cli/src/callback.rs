//! Loopback listener that receives the SSO redirect.

use crate::error::CliError;
use axum::{
    Router,
    extract::{RawQuery, State},
    http::StatusCode,
    routing::get,
};
use ilm_platform_access::{CallbackOutcome, IdentityProvider, SsoAttempt, SsoCallback};
use oauth2::url::Url;
use std::sync::Arc;
use tokio::sync::Notify;

struct CallbackState {
    provider: Arc<IdentityProvider>,
    attempt: SsoAttempt,
    done: Notify,
}

/// Serves the redirect URI until the attempt has been handled or the user
/// interrupts.
pub async fn await_callback(
    provider: Arc<IdentityProvider>,
    attempt: SsoAttempt,
    redirect_uri: &str,
) -> Result<(), CliError> {
    let url = Url::parse(redirect_uri).map_err(|e| CliError::Listener {
        reason: format!("invalid redirect URI '{redirect_uri}': {e}"),
    })?;
    let host = url.host_str().ok_or_else(|| CliError::Listener {
        reason: format!("redirect URI '{redirect_uri}' has no host"),
    })?;
    let port = url.port_or_known_default().ok_or_else(|| CliError::Listener {
        reason: format!("redirect URI '{redirect_uri}' has no port"),
    })?;

    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .map_err(|e| CliError::Listener {
            reason: format!("cannot listen on {host}:{port}: {e}"),
        })?;

    let state = Arc::new(CallbackState {
        provider,
        attempt,
        done: Notify::new(),
    });
    let app = Router::new()
        .route(url.path(), get(callback))
        .with_state(state.clone());

    tracing::info!(%host, port, path = url.path(), "waiting for SSO callback");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                () = state.done.notified() => {}
                _ = tokio::signal::ctrl_c() => {
                    tracing::warn!("interrupted before the SSO callback arrived");
                }
            }
        })
        .await
        .map_err(|e| CliError::Listener {
            reason: e.to_string(),
        })
}

async fn callback(
    State(state): State<Arc<CallbackState>>,
    RawQuery(query): RawQuery,
) -> (StatusCode, String) {
    let callback = match SsoCallback::from_query(query.as_deref().unwrap_or_default()) {
        Ok(callback) => callback,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                format!("Malformed callback parameters: {e}"),
            );
        }
    };

    let reply = match state
        .provider
        .handle_sso_callback(&state.attempt, &callback)
        .await
    {
        Ok(CallbackOutcome::Established(session)) => (
            StatusCode::OK,
            format!(
                "Signed in as {}. You can close this window.",
                session.identity().display_name()
            ),
        ),
        Ok(CallbackOutcome::AlreadyHandled) => {
            return (
                StatusCode::OK,
                "This sign-in has already been handled. You can close this window.".to_string(),
            );
        }
        Err(report) => (
            StatusCode::UNAUTHORIZED,
            format!("Sign-in failed: {}", report.current_context()),
        ),
    };
    state.done.notify_one();
    reply
}
