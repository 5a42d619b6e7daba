//! Authentication service: translates account operations into API calls.
//!
//! No business logic lives here: one request per call, errors propagate to
//! the caller unchanged.

use crate::client::{ApiClient, ApiError, AuthorizedClient};
use crate::endpoints;
use crate::types::{ApiMessage, Credentials, EmailConfirmation, LoginResponse, UserInfo};

/// Backend account operations. `Session` depends on this trait so tests can
/// substitute a scripted double.
#[async_trait::async_trait]
pub trait AuthApi: Send + Sync {
    /// `POST /login/` with `{ email, senha }`.
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, ApiError>;

    /// `GET /teste/` through the authorized client.
    async fn get_profile(&self, client: &AuthorizedClient) -> Result<UserInfo, ApiError>;

    /// `POST /usuario/confirma/`.
    async fn confirm_email(&self, confirmation: &EmailConfirmation) -> Result<serde_json::Value, ApiError>;

    /// `POST /senha/recupera/codigo/` with `{ email }`.
    async fn request_change_password(&self, email: &str) -> Result<ApiMessage, ApiError>;
}

/// HTTP implementation of [`AuthApi`].
#[derive(Debug, Clone)]
pub struct AuthService {
    client: ApiClient,
}

impl AuthService {
    #[must_use]
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[derive(serde::Serialize)]
struct ResetPasswordRequest<'a> {
    email: &'a str,
}

#[async_trait::async_trait]
impl AuthApi for AuthService {
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, ApiError> {
        tracing::info!(email = %credentials.email, "requesting login");
        self.client.post_json(endpoints::LOGIN, credentials).await
    }

    async fn get_profile(&self, client: &AuthorizedClient) -> Result<UserInfo, ApiError> {
        client.get_json(endpoints::PROFILE).await
    }

    async fn confirm_email(&self, confirmation: &EmailConfirmation) -> Result<serde_json::Value, ApiError> {
        tracing::info!(user_name = %confirmation.user_name, "confirming email");
        self.client
            .post_json(endpoints::CONFIRM_EMAIL, confirmation)
            .await
    }

    async fn request_change_password(&self, email: &str) -> Result<ApiMessage, ApiError> {
        tracing::info!(email, "requesting password reset code");
        self.client
            .post_json(endpoints::RESET_PASSWORD, &ResetPasswordRequest { email })
            .await
    }
}

#[cfg(test)]
#[path = "service_test.rs"]
mod tests;
