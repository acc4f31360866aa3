//! Session login against an EDD instance
//!
//! EDD uses Django's CSRF protection, so logging in takes two requests:
//! a GET of the login page, which sets a `csrftoken` cookie, followed by a
//! form POST that echoes that token back together with the credentials. The
//! cookie jar of the client then holds the session cookie used by all later
//! requests.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::REFERER;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::endpoint::Endpoint;
use crate::error::{ExportError, ExportResult, Step};

/// Name of the cookie carrying the CSRF token
pub const CSRF_COOKIE: &str = "csrftoken";

/// Text the login page shows when the credentials are rejected
pub const LOGIN_FAILED_MARKER: &str = "Login failed.";

/// Transport settings for the session client
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// Connection establishment timeout
    pub connect_timeout: Option<Duration>,
    /// Overall per-request timeout, including reading the body. Leave unset
    /// for large exports.
    pub timeout: Option<Duration>,
}

/// An authenticated client bound to one EDD instance
#[derive(Debug, Clone)]
pub struct Session {
    client: Client,
    endpoint: Endpoint,
    username: String,
}

impl Session {
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

/// Result of a login attempt that reached the server
#[derive(Debug)]
pub enum LoginOutcome {
    /// Credentials accepted
    Authenticated(Session),
    /// The server answered with its login failure page
    Rejected { username: String },
}

impl LoginOutcome {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, LoginOutcome::Authenticated(_))
    }

    /// Turn a rejection into [`ExportError::InvalidCredentials`]
    pub fn into_session(self) -> ExportResult<Session> {
        match self {
            LoginOutcome::Authenticated(session) => Ok(session),
            LoginOutcome::Rejected { username } => {
                Err(ExportError::InvalidCredentials { username })
            }
        }
    }
}

#[derive(Serialize)]
struct LoginForm<'a> {
    csrfmiddlewaretoken: &'a str,
    login: &'a str,
    password: &'a str,
}

fn build_client(options: &ClientOptions) -> ExportResult<Client> {
    let mut builder = Client::builder()
        .cookie_store(true)
        .user_agent(concat!("edd-export/", env!("CARGO_PKG_VERSION")))
        .timeout(options.timeout);
    if let Some(connect_timeout) = options.connect_timeout {
        builder = builder.connect_timeout(connect_timeout);
    }
    builder.build().map_err(ExportError::network(Step::Login))
}

/// Log in with default client options
pub fn authenticate(
    endpoint: &Endpoint,
    username: &str,
    password: SecretString,
) -> ExportResult<LoginOutcome> {
    authenticate_with(endpoint, username, password, &ClientOptions::default())
}

/// Log in to `endpoint`.
///
/// The password is consumed and dropped as soon as the credential POST has
/// been sent, whatever the outcome.
pub fn authenticate_with(
    endpoint: &Endpoint,
    username: &str,
    password: SecretString,
    options: &ClientOptions,
) -> ExportResult<LoginOutcome> {
    if username.trim().is_empty() {
        return Err(ExportError::InvalidArgument(
            "Username must not be empty".to_string(),
        ));
    }

    let client = build_client(options)?;
    let login_url = endpoint.login_url()?;

    debug!("Fetching CSRF token from {}", login_url);
    let csrf_response = client
        .get(login_url.clone())
        .send()
        .map_err(ExportError::network(Step::Login))?;
    let status = csrf_response.status();
    if !status.is_success() {
        return Err(ExportError::HttpStatus {
            step: Step::Login,
            status,
        });
    }
    let csrf_token = csrf_response
        .cookies()
        .find(|c| c.name() == CSRF_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or_else(|| ExportError::MissingCsrfToken {
            url: login_url.to_string(),
        })?;

    let form = LoginForm {
        csrfmiddlewaretoken: &csrf_token,
        login: username,
        password: password.expose_secret(),
    };
    let sent = client
        .post(login_url.clone())
        .header(REFERER, login_url.as_str())
        .form(&form)
        .send();
    drop(form);
    drop(password);
    let login_response = sent.map_err(ExportError::network(Step::Login))?;

    let status = login_response.status();
    let body = login_response
        .text()
        .map_err(ExportError::network(Step::Login))?;

    if body.contains(LOGIN_FAILED_MARKER) {
        warn!("Login rejected for user '{}' on {}", username, endpoint.host());
        return Ok(LoginOutcome::Rejected {
            username: username.to_string(),
        });
    }
    if !status.is_success() {
        return Err(ExportError::HttpStatus {
            step: Step::Login,
            status,
        });
    }

    info!("Logged in to {} as '{}'", endpoint.host(), username);
    Ok(LoginOutcome::Authenticated(Session {
        client,
        endpoint: endpoint.clone(),
        username: username.to_string(),
    }))
}
