//! HTTP client wrapper for the backend API.
//!
//! DESIGN
//! ======
//! `ApiClient` performs anonymous calls. Authorized calls go through an
//! `AuthorizedClient`, built from a `TokenSet` with the bearer header baked
//! into its default headers. A new one is built for every token and it is
//! dropped on logout, so no request middleware is ever mutated in place.
//!
//! ERROR HANDLING
//! ==============
//! Non-2xx responses become `ApiError::Status` carrying the server's
//! `body.mensagem` when the error body has one. Single attempt, no retries.

use std::fmt;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::{ClientConfig, Timeouts};
use crate::types::{ApiMessage, TokenSet};

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request never produced a response (DNS, connect, timeout, TLS).
    #[error("request failed: {0}")]
    Network(String),

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {}", .message.as_deref().unwrap_or("no message"))]
    Status { status: u16, message: Option<String> },

    /// A success body could not be decoded into the expected type.
    #[error("response decode failed: {0}")]
    Decode(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    /// The token cannot be carried in an HTTP header.
    #[error("token is not a valid header value")]
    InvalidToken,
}

impl ApiError {
    /// Server-provided message, when the error body carried one.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Status { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

/// Extract `body.mensagem` from an error body, if it has that shape.
pub(crate) fn parse_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ApiMessage>(body)
        .ok()
        .map(|msg| msg.body.mensagem)
}

// =============================================================================
// ANONYMOUS CLIENT
// =============================================================================

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    timeouts: Timeouts,
}

impl ApiClient {
    /// Build a client for `base_url` (trailing slash ignored).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(base_url: &str, timeouts: Timeouts) -> Result<Self, ApiError> {
        let http = build_http(HeaderMap::new(), timeouts)?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_owned(), timeouts })
    }

    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        Self::new(&config.api_url, config.timeouts)
    }

    /// Build the authorized capability for `tokens`.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not header-safe or the HTTP client
    /// fails to build.
    pub fn authorize(&self, tokens: &TokenSet) -> Result<AuthorizedClient, ApiError> {
        let mut value =
            HeaderValue::from_str(&format!("Bearer {}", tokens.token)).map_err(|_| ApiError::InvalidToken)?;
        value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, value);

        let http = build_http(headers, self.timeouts)?;
        Ok(AuthorizedClient { http, base_url: self.base_url.clone(), token: tokens.token.clone() })
    }

    /// # Errors
    ///
    /// See [`ApiError`].
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        send(self.http.get(join_url(&self.base_url, path)), path).await
    }

    /// # Errors
    ///
    /// See [`ApiError`].
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        send(self.http.post(join_url(&self.base_url, path)).json(body), path).await
    }
}

// =============================================================================
// AUTHORIZED CLIENT
// =============================================================================

/// Client that sends `Authorization: Bearer <token>` on every request.
#[derive(Clone)]
pub struct AuthorizedClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl AuthorizedClient {
    /// The bearer token this client was built for.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// # Errors
    ///
    /// See [`ApiError`].
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        send(self.http.get(join_url(&self.base_url, path)), path).await
    }

    /// # Errors
    ///
    /// See [`ApiError`].
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        send(self.http.post(join_url(&self.base_url, path)).json(body), path).await
    }
}

impl fmt::Debug for AuthorizedClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizedClient")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .finish_non_exhaustive()
    }
}

// =============================================================================
// TRANSPORT
// =============================================================================

fn build_http(headers: HeaderMap, timeouts: Timeouts) -> Result<reqwest::Client, ApiError> {
    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(timeouts.request_secs))
        .connect_timeout(Duration::from_secs(timeouts.connect_secs))
        .build()
        .map_err(|e| ApiError::HttpClientBuild(e.to_string()))
}

fn join_url(base_url: &str, path: &str) -> String {
    format!("{base_url}{path}")
}

async fn send<T: DeserializeOwned>(request: reqwest::RequestBuilder, path: &str) -> Result<T, ApiError> {
    let response = request
        .send()
        .await
        .map_err(|e| ApiError::Network(e.to_string()))?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| ApiError::Network(e.to_string()))?;

    if !status.is_success() {
        tracing::debug!(path, status = status.as_u16(), "api request rejected");
        return Err(ApiError::Status { status: status.as_u16(), message: parse_error_message(&text) });
    }

    tracing::debug!(path, status = status.as_u16(), "api request ok");
    decode_body(&text)
}

/// Decode a success body. An empty body decodes as JSON `null`.
fn decode_body<T: DeserializeOwned>(text: &str) -> Result<T, ApiError> {
    let text = if text.trim().is_empty() { "null" } else { text };
    serde_json::from_str(text).map_err(|e| ApiError::Decode(e.to_string()))
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
