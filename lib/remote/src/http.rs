//! HTTP adapter for the backing API.

use crate::dto::{
    self, ApproveAccountRequest, CreateMentorRequest, DecideRequest, ForgotPasswordRequest,
    LoginRequest,
    MentorRequestDto, MentorshipSummaryDto, RegisterRequest, SsoCallbackRequest,
    SsoTokenResponse, TokenResponse, UserDto,
};
use async_trait::async_trait;
use ilm_core::{MentorRequestId, UserId};
use ilm_mentorship::{
    Decision, MentorRequest, MentorRequestStatus, MentorshipSummary, RemoteWorkflowStore,
};
use ilm_platform_access::{
    AccessToken, AuthorizationCode, Credentials, Identity, Registration, RemoteDirectory,
    RemoteError, Role, SsoGrant,
};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Talks to the backing API over JSON/HTTP.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: Client,
    base_url: Url,
}

impl HttpRemote {
    /// Creates a client for `base_url` (e.g. "http://localhost:8000/api/v1").
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RemoteError> {
        let raw = base_url.into();
        let base_url = Url::parse(&raw)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| RemoteError::Unavailable {
                status: None,
                message: Some(format!("'{raw}' is not a usable base URL")),
            })?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Unavailable {
                status: None,
                message: Some(format!("failed to build HTTP client: {e}")),
            })?;
        Ok(Self { client, base_url })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Appends `segments` to the base path. Each segment is percent-encoded,
    /// so an id can never climb out of its collection.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Sends a request and parses a successful body as `T`.
    async fn send<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T, RemoteError> {
        let body = self.fetch(operation, request).await?;
        serde_json::from_slice(&body).map_err(|e| dto::malformed(operation, e))
    }

    /// Sends a request and returns the body of a successful response.
    async fn fetch(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<Vec<u8>, RemoteError> {
        let response = request.send().await.map_err(|e| {
            warn!(operation, error = %e, "request to backing API failed");
            RemoteError::Unavailable {
                status: None,
                message: None,
            }
        })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            warn!(operation, error = %e, "failed to read response body");
            RemoteError::Unavailable {
                status: Some(status.as_u16()),
                message: None,
            }
        })?;

        if !status.is_success() {
            let message = dto::error_message(&body);
            debug!(operation, status = status.as_u16(), "backing API returned an error");
            return Err(status_error(status, message));
        }
        Ok(body.to_vec())
    }

    async fn send_request(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<MentorRequest, RemoteError> {
        let dto: MentorRequestDto = self.send(operation, request).await?;
        dto.into_request(operation)
    }

    async fn send_requests(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<Vec<MentorRequest>, RemoteError> {
        let dtos: Vec<MentorRequestDto> = self.send(operation, request).await?;
        dtos.into_iter()
            .map(|dto| dto.into_request(operation))
            .collect()
    }

    async fn send_users(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<Vec<Identity>, RemoteError> {
        let dtos: Vec<UserDto> = self.send(operation, request).await?;
        dtos.into_iter()
            .map(|dto| dto.into_identity(operation))
            .collect()
    }
}

/// Maps a non-success status to the remote error taxonomy.
fn status_error(status: StatusCode, message: Option<String>) -> RemoteError {
    match status.as_u16() {
        401 => RemoteError::Unauthorized { message },
        403 => RemoteError::Forbidden { message },
        404 => RemoteError::NotFound { message },
        409 => RemoteError::Conflict { message },
        code @ 400..=499 => RemoteError::Rejected {
            status: code,
            message,
        },
        code => RemoteError::Unavailable {
            status: Some(code),
            message,
        },
    }
}

#[async_trait]
impl RemoteDirectory for HttpRemote {
    #[instrument(skip(self, credentials))]
    async fn login(&self, credentials: &Credentials) -> Result<AccessToken, RemoteError> {
        let body = LoginRequest {
            email: credentials.email(),
            password: credentials.password(),
        };
        let response: TokenResponse = self
            .send("login", self.client.post(self.url(&["auth", "login"])).json(&body))
            .await?;
        Ok(AccessToken::new(response.access_token))
    }

    #[instrument(skip(self, token))]
    async fn profile(&self, token: &AccessToken) -> Result<Identity, RemoteError> {
        let dto: UserDto = self
            .send(
                "profile",
                self.client
                    .get(self.url(&["users", "me"]))
                    .bearer_auth(token.secret()),
            )
            .await?;
        dto.into_identity("profile")
    }

    #[instrument(skip(self, registration), fields(role = %registration.role()))]
    async fn register(&self, registration: &Registration) -> Result<Identity, RemoteError> {
        let body = RegisterRequest {
            name: registration.name(),
            email: registration.email(),
            password: registration.password(),
            role: registration.role().as_upper(),
        };
        let dto: UserDto = self
            .send(
                "register",
                self.client.post(self.url(&["auth", "register"])).json(&body),
            )
            .await?;
        dto.into_identity("register")
    }

    #[instrument(skip(self, code))]
    async fn exchange_sso_code(&self, code: &AuthorizationCode) -> Result<SsoGrant, RemoteError> {
        let body = SsoCallbackRequest {
            code: code.secret(),
        };
        let response: SsoTokenResponse = self
            .send(
                "sso_exchange",
                self.client
                    .post(self.url(&["auth", "sso", "azure", "callback"]))
                    .json(&body),
            )
            .await?;
        Ok(SsoGrant {
            token: AccessToken::new(response.access_token),
            identity: response.user.into_identity("sso_exchange")?,
        })
    }

    #[instrument(skip(self, email))]
    async fn request_password_reset(&self, email: &str) -> Result<(), RemoteError> {
        let body = ForgotPasswordRequest { email };
        self.fetch(
            "forgot_password",
            self.client
                .post(self.url(&["auth", "forgot-password"]))
                .json(&body),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self, token))]
    async fn list_identities(
        &self,
        token: &AccessToken,
        role: Option<Role>,
    ) -> Result<Vec<Identity>, RemoteError> {
        let mut request = self
            .client
            .get(self.url(&["users"]))
            .bearer_auth(token.secret());
        if let Some(role) = role {
            request = request.query(&[("role", role.as_str())]);
        }
        self.send_users("list_identities", request).await
    }

    #[instrument(skip(self, token))]
    async fn pending_accounts(&self, token: &AccessToken) -> Result<Vec<Identity>, RemoteError> {
        let request = self
            .client
            .get(self.url(&["admin", "users", "pending"]))
            .bearer_auth(token.secret());
        self.send_users("pending_accounts", request).await
    }

    #[instrument(skip(self, token))]
    async fn approve_account(
        &self,
        token: &AccessToken,
        user_id: &UserId,
        role: Role,
    ) -> Result<Identity, RemoteError> {
        let body = ApproveAccountRequest {
            role: role.as_str(),
            is_approved: true,
        };
        let dto: UserDto = self
            .send(
                "approve_account",
                self.client
                    .patch(self.url(&["admin", "users", user_id.as_str()]))
                    .bearer_auth(token.secret())
                    .json(&body),
            )
            .await?;
        dto.into_identity("approve_account")
    }
}

#[async_trait]
impl RemoteWorkflowStore for HttpRemote {
    #[instrument(skip(self, token))]
    async fn create_request(
        &self,
        token: &AccessToken,
        mentor_id: &UserId,
    ) -> Result<MentorRequest, RemoteError> {
        let body = CreateMentorRequest {
            mentor_user_id: mentor_id.as_str(),
        };
        let request = self
            .client
            .post(self.url(&["mentor-requests"]))
            .bearer_auth(token.secret())
            .json(&body);
        self.send_request("create_mentor_request", request).await
    }

    #[instrument(skip(self, token))]
    async fn list_mine(&self, token: &AccessToken) -> Result<Vec<MentorRequest>, RemoteError> {
        let request = self
            .client
            .get(self.url(&["mentor-requests", "me"]))
            .bearer_auth(token.secret());
        self.send_requests("list_my_mentor_requests", request).await
    }

    #[instrument(skip(self, token))]
    async fn list_by_status(
        &self,
        token: &AccessToken,
        status: Option<MentorRequestStatus>,
    ) -> Result<Vec<MentorRequest>, RemoteError> {
        let mut request = self
            .client
            .get(self.url(&["mentor-requests"]))
            .bearer_auth(token.secret());
        if let Some(status) = status {
            request = request.query(&[("status", status.as_str())]);
        }
        self.send_requests("list_mentor_requests", request).await
    }

    #[instrument(skip(self, token))]
    async fn decide(
        &self,
        token: &AccessToken,
        request_id: &MentorRequestId,
        decision: Decision,
    ) -> Result<MentorRequest, RemoteError> {
        let body = DecideRequest {
            status: decision.status(),
            expected_status: MentorRequestStatus::Pending,
        };
        let request = self
            .client
            .patch(self.url(&["mentor-requests", request_id.as_str()]))
            .bearer_auth(token.secret())
            .json(&body);
        self.send_request("decide_mentor_request", request).await
    }

    #[instrument(skip(self, token))]
    async fn mentorship_summary(
        &self,
        token: &AccessToken,
    ) -> Result<MentorshipSummary, RemoteError> {
        let dto: MentorshipSummaryDto = self
            .send(
                "mentorship_summary",
                self.client
                    .get(self.url(&["mentorships", "me"]))
                    .bearer_auth(token.secret()),
            )
            .await?;
        dto.into_summary("mentorship_summary")
    }
}
