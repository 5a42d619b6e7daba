//! isf-auth command line: log in, inspect and clear the persisted session.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use isf_auth::client::ApiError;
use isf_auth::config::{ClientConfig, ConfigError};
use isf_auth::login::{LoginForm, NotificationKind, SubmitOutcome};
use isf_auth::session::{PROFILE_ERROR_MESSAGE, Session, SessionError, SessionState};
use isf_auth::types::EmailConfirmation;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Api(#[from] ApiError),
    #[error("{0}")]
    Session(#[from] SessionError),
    #[error("invalid input: {0}")]
    Invalid(String),
    #[error("not logged in")]
    NotLoggedIn,
    #[error("login failed")]
    LoginFailed,
    #[error("invalid JSON output: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "isf-auth", about = "ISF-SUS login and session CLI")]
struct Cli {
    /// API base URL (overrides ISF_API_URL).
    #[arg(long)]
    base_url: Option<String>,

    /// Token file (overrides ISF_TOKEN_FILE).
    #[arg(long)]
    token_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and persist the returned tokens.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "ISF_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Discard the persisted tokens.
    Logout,
    /// Print the profile of the logged-in user.
    Whoami,
    /// Print the session state.
    Status,
    /// Confirm an email address with the code sent by the backend.
    ConfirmEmail {
        #[arg(long)]
        client_id: String,
        #[arg(long)]
        user_name: String,
        #[arg(long)]
        code: String,
    },
    /// Request a password-reset code.
    ForgotPassword {
        #[arg(long)]
        email: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = ClientConfig::from_env()?;
    if let Some(url) = &cli.base_url {
        config = config.with_api_url(url)?;
    }
    if let Some(path) = cli.token_file {
        config.token_file = path;
    }
    tracing::debug!(api_url = %config.api_url, token_file = %config.token_file.display(), "config loaded");

    let mut session = Session::from_config(&config)?;

    match cli.command {
        Command::Login { email, password } => run_login(&mut session, email, password).await,
        Command::Logout => {
            session.logout()?;
            println!("logged out");
            Ok(())
        }
        Command::Whoami => run_whoami(&mut session).await,
        Command::Status => run_status(&mut session).await,
        Command::ConfirmEmail { client_id, user_name, code } => {
            let confirmation = EmailConfirmation { client_id, user_name, confirmation_code: code };
            let ack = session.api().confirm_email(&confirmation).await?;
            print_json(&ack)
        }
        Command::ForgotPassword { email } => {
            let ack = session.api().request_change_password(email.trim()).await?;
            println!("{}", ack.message());
            Ok(())
        }
    }
}

async fn run_login(session: &mut Session, email: String, password: String) -> Result<(), CliError> {
    let outcome = LoginForm::new(email, password).submit(session).await;
    let notifications = outcome.notifications();
    for n in &notifications {
        match n.kind {
            NotificationKind::Success => println!("{}", n.message),
            NotificationKind::Error => eprintln!("{}", n.message),
        }
    }

    match outcome {
        SubmitOutcome::Invalid(errors) => {
            let mut problems = Vec::new();
            if let Some(msg) = errors.email {
                problems.push(format!("email: {msg}"));
            }
            if let Some(msg) = errors.password {
                problems.push(format!("password: {msg}"));
            }
            Err(CliError::Invalid(problems.join("; ")))
        }
        // The server message was already shown; otherwise fall back to the error itself.
        SubmitOutcome::Rejected(_) if !notifications.is_empty() => Err(CliError::LoginFailed),
        SubmitOutcome::Rejected(error) => Err(error.into()),
        SubmitOutcome::LoggedIn(login) => match login.profile {
            Ok(profile) => print_json(&profile),
            Err(error) => {
                tracing::debug!(error = %error, "profile unavailable after login");
                Err(CliError::LoginFailed)
            }
        },
    }
}

async fn run_whoami(session: &mut Session) -> Result<(), CliError> {
    session.initialize().await?;
    let profile = session.user_info().ok_or(CliError::NotLoggedIn)?;
    print_json(profile)
}

async fn run_status(session: &mut Session) -> Result<(), CliError> {
    let state = match session.initialize().await {
        Ok(state) => state,
        Err(SessionError::ProfileUnavailable(e)) => {
            eprintln!("{PROFILE_ERROR_MESSAGE}: {e}");
            session.state()
        }
        Err(e) => return Err(e.into()),
    };
    let label = match state {
        SessionState::AnonymousLoading | SessionState::Anonymous => "anonymous",
        SessionState::Authenticating => "authenticating",
        SessionState::Authorized => "authorized",
    };
    println!("{label}");
    Ok(())
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
