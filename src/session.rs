//! Session: single owner of the login state.
//!
//! ARCHITECTURE
//! ============
//! `Session` holds the in-memory token, the `AuthorizedClient` built for it,
//! the cached profile and the startup loading flag. Every operation takes
//! `&mut self`, so login, profile fetch and logout are serialized by
//! ownership instead of locks.
//!
//! ```text
//! AnonymousLoading ─(no persisted token)──────────▶ Anonymous
//!        └─(persisted token)─▶ Authenticating ─(profile ok)─▶ Authorized
//! Anonymous ─login─▶ Authenticating
//! Authorized ─logout─▶ Anonymous
//! Authenticating/Authorized ─(profile fetch fails)─▶ Anonymous
//! ```
//!
//! TRADE-OFFS
//! ==========
//! A failed profile fetch is treated as an invalid or expired token and
//! resets everything: persisted slot, in-memory token, authorized client and
//! cached profile. Keeping the token in memory after discarding it on disk
//! would leave a half-authenticated session nobody can observe.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::client::{ApiClient, ApiError, AuthorizedClient};
use crate::config::ClientConfig;
use crate::service::{AuthApi, AuthService};
use crate::store::{FileTokenStore, StoreError, TokenStore};
use crate::types::{Credentials, TokenSet, UserInfo};

/// User-facing text for a failed profile fetch.
pub const PROFILE_ERROR_MESSAGE: &str = "Não foi possível obter os dados do usuário";

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The profile could not be fetched with the current token; the session
    /// has been reset.
    #[error("Não foi possível obter os dados do usuário")]
    ProfileUnavailable(#[source] ApiError),

    #[error("not logged in")]
    NotAuthenticated,
}

impl SessionError {
    /// Server-provided message carried by an API rejection, if any.
    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Api(e) | Self::ProfileUnavailable(e) => e.message(),
            _ => None,
        }
    }
}

// =============================================================================
// STATE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Startup check for a persisted token has not settled yet.
    AnonymousLoading,
    Anonymous,
    /// A token is held but no profile has been fetched with it.
    Authenticating,
    Authorized,
}

/// Result of a successful login. The credentials were accepted even when
/// the follow-up profile fetch failed.
#[derive(Debug)]
pub struct LoginOutcome {
    pub tokens: TokenSet,
    pub profile: Result<UserInfo, SessionError>,
}

// =============================================================================
// SESSION
// =============================================================================

pub struct Session {
    client: ApiClient,
    api: Arc<dyn AuthApi>,
    store: Arc<dyn TokenStore>,
    tokens: Option<TokenSet>,
    authorized: Option<AuthorizedClient>,
    user_info: Option<UserInfo>,
    loading: bool,
}

impl Session {
    /// New session in `AnonymousLoading`; call [`Session::initialize`] next.
    #[must_use]
    pub fn new(client: ApiClient, api: Arc<dyn AuthApi>, store: Arc<dyn TokenStore>) -> Self {
        Self { client, api, store, tokens: None, authorized: None, user_info: None, loading: true }
    }

    /// Session over the HTTP service and the configured token file.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        let client = ApiClient::from_config(config)?;
        let api = Arc::new(AuthService::new(client.clone()));
        let store = Arc::new(FileTokenStore::new(&config.token_file));
        Ok(Self::new(client, api, store))
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn state(&self) -> SessionState {
        if self.user_info.is_some() {
            SessionState::Authorized
        } else if self.tokens.is_some() {
            SessionState::Authenticating
        } else if self.loading {
            SessionState::AnonymousLoading
        } else {
            SessionState::Anonymous
        }
    }

    /// True until the startup token check (and its profile fetch) settles.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// True iff a profile was fetched with the current token.
    #[must_use]
    pub fn authorized(&self) -> bool {
        self.user_info.is_some()
    }

    #[must_use]
    pub fn user_info(&self) -> Option<&UserInfo> {
        self.user_info.as_ref()
    }

    #[must_use]
    pub fn tokens(&self) -> Option<&TokenSet> {
        self.tokens.as_ref()
    }

    #[must_use]
    pub fn authorized_client(&self) -> Option<&AuthorizedClient> {
        self.authorized.as_ref()
    }

    #[must_use]
    pub fn api(&self) -> &dyn AuthApi {
        self.api.as_ref()
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Pick up a persisted token and fetch the profile with it.
    ///
    /// No-op when a token is already held. An undecodable persisted slot is
    /// cleared and treated as empty.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails or the profile fetch fails; in the
    /// latter case the session is reset to `Anonymous`.
    pub async fn initialize(&mut self) -> Result<SessionState, SessionError> {
        if self.tokens.is_some() {
            return Ok(self.state());
        }

        let persisted = match self.store.load() {
            Ok(tokens) => tokens,
            Err(StoreError::Encode(e)) => {
                tracing::warn!(error = %e, "discarding unreadable persisted tokens");
                self.loading = false;
                self.store.clear()?;
                None
            }
            Err(e) => {
                self.loading = false;
                return Err(e.into());
            }
        };

        let Some(tokens) = persisted else {
            self.loading = false;
            tracing::debug!("no persisted tokens");
            return Ok(self.state());
        };

        if let Err(e) = self.install(tokens) {
            tracing::warn!(error = %e, "persisted token unusable");
            self.loading = false;
            self.store.clear()?;
            return Err(e.into());
        }

        tracing::info!("restored persisted session");
        let result = self.ensure_profile().await;
        self.loading = false;
        result.map(|_| self.state())
    }

    /// Log in, persist the returned tokens and fetch the profile.
    ///
    /// The login request is always anonymous; a previous authorized client
    /// is only replaced once the new token is in hand. On rejection nothing
    /// changes.
    ///
    /// # Errors
    ///
    /// Returns the API rejection, or a storage error if the tokens cannot be
    /// persisted. A failed profile fetch is reported in
    /// [`LoginOutcome::profile`], not here.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<LoginOutcome, SessionError> {
        let credentials = Credentials::new(email, password);
        let response = self.api.login(&credentials).await?;
        let tokens = response.body;

        let authorized = self.client.authorize(&tokens)?;
        self.store.save(&tokens)?;
        self.authorized = Some(authorized);
        self.tokens = Some(tokens.clone());
        self.user_info = None;
        self.loading = false;
        tracing::info!(email, "login accepted");

        let profile = self.ensure_profile().await;
        Ok(LoginOutcome { tokens, profile })
    }

    /// Drop the authorized client, persisted tokens, token and profile.
    /// Safe to call when already logged out.
    ///
    /// # Errors
    ///
    /// Returns an error if the persisted slot cannot be removed; in-memory
    /// state is cleared regardless.
    pub fn logout(&mut self) -> Result<(), SessionError> {
        let was_logged_in = self.tokens.is_some();
        self.authorized = None;
        self.tokens = None;
        self.user_info = None;
        self.loading = false;
        self.store.clear()?;
        if was_logged_in {
            tracing::info!("logged out");
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Profile
    // -------------------------------------------------------------------------

    /// Cached profile, fetching it first if a token is held and nothing is
    /// cached yet.
    ///
    /// # Errors
    ///
    /// `NotAuthenticated` without a token; `ProfileUnavailable` when the
    /// fetch fails (the session is reset).
    pub async fn ensure_profile(&mut self) -> Result<UserInfo, SessionError> {
        if let Some(info) = &self.user_info {
            return Ok(info.clone());
        }
        self.fetch_profile().await
    }

    /// Re-fetch the profile even if one is cached.
    ///
    /// # Errors
    ///
    /// Same as [`Session::ensure_profile`].
    pub async fn update_user_info(&mut self) -> Result<UserInfo, SessionError> {
        self.fetch_profile().await
    }

    async fn fetch_profile(&mut self) -> Result<UserInfo, SessionError> {
        let Some(client) = self.authorized.as_ref() else {
            return Err(SessionError::NotAuthenticated);
        };

        let result = self.api.get_profile(client).await;
        match result {
            Ok(info) => {
                self.user_info = Some(info.clone());
                tracing::info!("profile loaded");
                Ok(info)
            }
            Err(e) => {
                tracing::warn!(error = %e, "profile fetch failed; discarding tokens");
                self.reset();
                Err(SessionError::ProfileUnavailable(e))
            }
        }
    }

    // -------------------------------------------------------------------------
    // Authorized requests
    // -------------------------------------------------------------------------

    /// Authorized GET. A 401 logs the session out before the error returns.
    ///
    /// # Errors
    ///
    /// `NotAuthenticated` without a token, otherwise the API error.
    pub async fn get_json<T: DeserializeOwned>(&mut self, path: &str) -> Result<T, SessionError> {
        let client = self.authorized.as_ref().ok_or(SessionError::NotAuthenticated)?;
        let result = client.get_json(path).await;
        self.settle_authorized(path, result)
    }

    /// Authorized POST. A 401 logs the session out before the error returns.
    ///
    /// # Errors
    ///
    /// `NotAuthenticated` without a token, otherwise the API error.
    pub async fn post_json<B, T>(&mut self, path: &str, body: &B) -> Result<T, SessionError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let client = self.authorized.as_ref().ok_or(SessionError::NotAuthenticated)?;
        let result = client.post_json(path, body).await;
        self.settle_authorized(path, result)
    }

    fn settle_authorized<T>(&mut self, path: &str, result: Result<T, ApiError>) -> Result<T, SessionError> {
        match result {
            Err(e) if e.is_unauthorized() => {
                tracing::warn!(path, "token rejected; logging out");
                if let Err(clear_err) = self.logout() {
                    tracing::warn!(error = %clear_err, "failed to clear persisted tokens");
                }
                Err(e.into())
            }
            other => other.map_err(SessionError::from),
        }
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn install(&mut self, tokens: TokenSet) -> Result<(), ApiError> {
        self.authorized = Some(self.client.authorize(&tokens)?);
        self.tokens = Some(tokens);
        Ok(())
    }

    fn reset(&mut self) {
        if let Err(e) = self.logout() {
            tracing::warn!(error = %e, "failed to clear persisted tokens");
        }
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
