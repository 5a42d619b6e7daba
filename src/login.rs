//! Login form: client-side validation, submission and feedback.
//!
//! The form never talks to the network while validation fails. Rendering is
//! left to the caller: `SubmitOutcome` says which inline field errors or
//! which notification to show.

use crate::session::{LoginOutcome, PROFILE_ERROR_MESSAGE, Session, SessionError};
use crate::types::Credentials;

pub const PASSWORD_MIN_LEN: usize = 8;
pub const REQUIRED_MESSAGE: &str = "Campo obrigatório";
pub const INVALID_EMAIL_MESSAGE: &str = "E-mail inválido";
pub const LOGIN_SUCCESS_MESSAGE: &str = "Login realizado com sucesso";

#[must_use]
pub fn min_length_message(len: usize) -> String {
    format!("Deve ter no mínimo {len} caracteres")
}

// =============================================================================
// VALIDATION
// =============================================================================

/// Inline error per field; `None` means the field is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl FieldErrors {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.password.is_none()
    }
}

/// Syntactic address check: one `@`, a dotted domain, no whitespace.
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || local.len() > 64 || domain.contains('@') {
        return false;
    }
    if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return false;
    }
    let local_ok = local
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "!#$%&'*+/=?^_`{|}~.-".contains(c));
    if !local_ok {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    labels.iter().all(|label| {
        !label.is_empty()
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}

fn validate_email(raw: &str) -> Result<String, String> {
    let email = raw.trim();
    if email.is_empty() {
        return Err(REQUIRED_MESSAGE.to_owned());
    }
    if !is_valid_email(email) {
        return Err(INVALID_EMAIL_MESSAGE.to_owned());
    }
    Ok(email.to_owned())
}

fn validate_password(raw: &str) -> Result<(), String> {
    if raw.is_empty() {
        return Err(REQUIRED_MESSAGE.to_owned());
    }
    if raw.chars().count() < PASSWORD_MIN_LEN {
        return Err(min_length_message(PASSWORD_MIN_LEN));
    }
    Ok(())
}

// =============================================================================
// FORM
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    password_visible: bool,
}

impl LoginForm {
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self { email: email.into(), password: password.into(), password_visible: false }
    }

    /// Validated credentials with the email trimmed, or the per-field errors.
    ///
    /// # Errors
    ///
    /// Returns `FieldErrors` when any field fails validation.
    pub fn validate(&self) -> Result<Credentials, FieldErrors> {
        let email = validate_email(&self.email);
        let password = validate_password(&self.password);
        match (email, password) {
            (Ok(email), Ok(())) => Ok(Credentials::new(email, self.password.clone())),
            (email, password) => Err(FieldErrors { email: email.err(), password: password.err() }),
        }
    }

    #[must_use]
    pub fn password_visible(&self) -> bool {
        self.password_visible
    }

    /// Flip password visibility, returning the new value.
    pub fn toggle_password_visibility(&mut self) -> bool {
        self.password_visible = !self.password_visible;
        self.password_visible
    }

    /// Validate and, only if valid, log in through `session`.
    pub async fn submit(&self, session: &mut Session) -> SubmitOutcome {
        let credentials = match self.validate() {
            Ok(credentials) => credentials,
            Err(errors) => return SubmitOutcome::Invalid(errors),
        };

        match session.login(&credentials.email, &credentials.password).await {
            Ok(outcome) => SubmitOutcome::LoggedIn(outcome),
            Err(error) => {
                tracing::info!(error = %error, "login rejected");
                SubmitOutcome::Rejected(error)
            }
        }
    }
}

// =============================================================================
// OUTCOME
// =============================================================================

#[derive(Debug)]
pub enum SubmitOutcome {
    /// Validation failed; no request was sent.
    Invalid(FieldErrors),
    /// The login call failed.
    Rejected(SessionError),
    /// Credentials accepted and tokens persisted.
    LoggedIn(LoginOutcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
}

/// Transient message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
}

impl Notification {
    fn error(message: &str) -> Self {
        Self { kind: NotificationKind::Error, message: message.to_owned() }
    }
}

impl SubmitOutcome {
    /// Notifications to show, in order.
    ///
    /// Validation failures are shown inline instead. A rejection without a
    /// server message shows nothing. An accepted login whose profile fetch
    /// failed shows the success followed by the profile error.
    #[must_use]
    pub fn notifications(&self) -> Vec<Notification> {
        match self {
            Self::Invalid(_) => Vec::new(),
            Self::Rejected(error) => error
                .server_message()
                .map(Notification::error)
                .into_iter()
                .collect(),
            Self::LoggedIn(outcome) => {
                let mut out = vec![Notification {
                    kind: NotificationKind::Success,
                    message: LOGIN_SUCCESS_MESSAGE.to_owned(),
                }];
                if outcome.profile.is_err() {
                    out.push(Notification::error(PROFILE_ERROR_MESSAGE));
                }
                out
            }
        }
    }
}

#[cfg(test)]
#[path = "login_test.rs"]
mod tests;
