//! Wire and domain types shared by the service, store and session layers.

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// CREDENTIALS
// =============================================================================

/// Email/password pair submitted to the login endpoint.
///
/// The backend expects the password under `senha`.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Credentials {
    pub email: String,
    #[serde(rename = "senha")]
    pub password: String,
}

impl Credentials {
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self { email: email.into(), password: password.into() }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

// =============================================================================
// TOKENS
// =============================================================================

/// Bearer credential bundle returned by login.
///
/// Companion fields the backend sends next to `token` are kept verbatim so a
/// persisted set round-trips without loss.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenSet {
    pub token: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TokenSet {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into(), extra: serde_json::Map::new() }
    }
}

impl fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSet")
            .field("token", &"<redacted>")
            .field("extra", &self.extra.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// `POST /login/` success body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub body: TokenSet,
}

// =============================================================================
// PROFILE
// =============================================================================

/// Server-provided profile record. The backend owns its shape; the client
/// only caches and exposes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserInfo(pub serde_json::Value);

impl UserInfo {
    /// Look up a top-level profile field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&serde_json::Value> {
        self.0.get(field)
    }

    /// Top-level string field, if present and a string.
    #[must_use]
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(serde_json::Value::as_str)
    }
}

// =============================================================================
// MESSAGES
// =============================================================================

/// `{ "body": { "mensagem": "..." } }` envelope used by error bodies and
/// acknowledgements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiMessage {
    pub body: MessageBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBody {
    #[serde(alias = "message")]
    pub mensagem: String,
}

impl ApiMessage {
    #[must_use]
    pub fn message(&self) -> &str {
        &self.body.mensagem
    }
}

/// Payload for `POST /usuario/confirma/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailConfirmation {
    pub client_id: String,
    pub user_name: String,
    pub confirmation_code: String,
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
