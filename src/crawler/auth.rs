//! Form-based login before the crawl
//!
//! The navigator drives one browsing session through a login form:
//!
//! ```text
//! NotStarted -> AtLoginPage -> Submitting -> Authenticated
//!                                        \-> LoginFailed
//! ```
//!
//! Success is judged by navigation: if submitting the form leaves the browser
//! on the login URL, the login failed and the page is probed for an error
//! message. The same session (and its cookies) is then used for the crawl.

use crate::config::AuthConfig;
use crate::crawler::browser::{click_within, goto_within, Browser, BrowserError};
use crate::crawler::truncate_detail;
use crate::url::normalize_url;
use crate::ConfigError;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Selectors probed, in order, for a login error message
pub const ERROR_PROBES: &[&str] = &[
    "[role=\"alert\"]",
    "[role=\"error\"]",
    ".error",
    ".error-message",
    ".alert-danger",
    "[data-test=\"error\"]",
];

/// Detail used when a failed login shows no recognizable error element
pub const LOGIN_FAILED_NO_REDIRECT: &str = "login_failed_no_redirect";

/// Errors that prevent the login attempt from completing
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AuthError {
    #[error("auth_error: login page {url} unreachable: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: BrowserError,
    },

    #[error("auth_error: submit target {0} not found")]
    MissingSubmit(String),

    #[error("auth_error: submitting credentials failed: {0}")]
    Submit(#[source] BrowserError),
}

/// Position of the navigator in the login flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    NotStarted,
    AtLoginPage,
    Submitting,
    Authenticated,
    LoginFailed,
}

/// How a completed login attempt ended
#[derive(Debug, Clone, PartialEq)]
pub enum AuthOutcome {
    /// The session is logged in; `landing` is where the site left us
    Authenticated { landing: Url },

    /// The form was submitted but the site stayed on the login page
    Failed { detail: String },
}

/// Credentials and the selectors that locate the login form
#[derive(Debug, Clone)]
pub struct Credentials {
    pub login_url: Url,
    pub username: String,
    pub password: String,
    pub username_selector: String,
    pub password_selector: String,
    pub submit_selector: String,
}

impl Credentials {
    /// Builds credentials from the `[auth]` section, resolving the password
    pub fn from_config(auth: &AuthConfig) -> Result<Self, ConfigError> {
        let login_url = normalize_url(&auth.login_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", auth.login_url, e)))?;

        Ok(Self {
            login_url,
            username: auth.username.clone(),
            password: auth.resolve_password()?,
            username_selector: auth.username_selector.clone(),
            password_selector: auth.password_selector.clone(),
            submit_selector: auth.submit_selector.clone(),
        })
    }
}

/// Drives a browsing session through the login form
#[derive(Debug)]
pub struct AuthNavigator {
    credentials: Credentials,
    timeout: Duration,
    state: AuthState,
}

impl AuthNavigator {
    /// Creates a navigator
    ///
    /// # Arguments
    ///
    /// * `credentials` - Login URL, credentials and form selectors
    /// * `timeout` - Bound on each navigation (login page load, form submit)
    pub fn new(credentials: Credentials, timeout: Duration) -> Self {
        Self {
            credentials,
            timeout,
            state: AuthState::NotStarted,
        }
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    pub fn login_url(&self) -> &Url {
        &self.credentials.login_url
    }

    /// Performs the login
    ///
    /// # Returns
    ///
    /// * `Ok(AuthOutcome::Authenticated)` - Logged in (or no form to fill)
    /// * `Ok(AuthOutcome::Failed)` - Submitted but still on the login page
    /// * `Err(AuthError)` - Login page unreachable, submit missing or failed
    pub async fn login<B: Browser>(&mut self, browser: &mut B) -> Result<AuthOutcome, AuthError> {
        let login_url = self.credentials.login_url.clone();
        tracing::info!("Navigating to login page {}", login_url);

        if let Err(source) = goto_within(browser, &login_url, self.timeout).await {
            self.state = AuthState::LoginFailed;
            return Err(AuthError::Unreachable {
                url: login_url.to_string(),
                source,
            });
        }
        self.state = AuthState::AtLoginPage;

        let has_username = browser
            .has_element(&self.credentials.username_selector)
            .unwrap_or(false);
        let has_password = browser
            .has_element(&self.credentials.password_selector)
            .unwrap_or(false);

        if !(has_username && has_password) {
            tracing::info!("No login form at {}, treating session as authenticated", login_url);
            self.state = AuthState::Authenticated;
            return Ok(AuthOutcome::Authenticated { landing: login_url });
        }

        self.submit(browser).await?;

        let resulting = browser
            .current_url()
            .cloned()
            .unwrap_or_else(|| login_url.clone());

        if !same_page(&resulting, &login_url) {
            tracing::info!("Login succeeded, landed on {}", resulting);
            self.state = AuthState::Authenticated;
            return Ok(AuthOutcome::Authenticated { landing: resulting });
        }

        let detail = probe_error_message(browser);
        tracing::warn!("Login failed: {}", detail);
        self.state = AuthState::LoginFailed;
        Ok(AuthOutcome::Failed { detail })
    }

    async fn submit<B: Browser>(&mut self, browser: &mut B) -> Result<(), AuthError> {
        let credentials = &self.credentials;
        let filled = browser
            .fill(&credentials.username_selector, &credentials.username)
            .and_then(|_| browser.fill(&credentials.password_selector, &credentials.password));
        if let Err(e) = filled {
            return Err(self.fail(AuthError::Submit(e)));
        }

        if !browser
            .has_element(&self.credentials.submit_selector)
            .unwrap_or(false)
        {
            let selector = self.credentials.submit_selector.clone();
            return Err(self.fail(AuthError::MissingSubmit(selector)));
        }

        self.state = AuthState::Submitting;
        tracing::debug!("Submitting login form via {}", self.credentials.submit_selector);

        if let Err(e) = click_within(browser, &self.credentials.submit_selector, self.timeout).await {
            return Err(self.fail(AuthError::Submit(e)));
        }
        Ok(())
    }

    fn fail(&mut self, error: AuthError) -> AuthError {
        self.state = AuthState::LoginFailed;
        error
    }

    /// Moves from the post-login landing page to the crawl start URL
    ///
    /// Skipped when the start URL is the login URL or the landing page. If
    /// the hop fails the browser returns to the landing page.
    ///
    /// # Returns
    ///
    /// The URL the crawl should begin from.
    pub async fn go_to_start<B: Browser>(&self, browser: &mut B, start: &Url, landing: &Url) -> Url {
        if same_page(start, &self.credentials.login_url) || same_page(start, landing) {
            return landing.clone();
        }

        match goto_within(browser, start, self.timeout).await {
            Ok(()) => start.clone(),
            Err(e) => {
                tracing::warn!(
                    "Could not open start URL {} after login ({}), continuing from {}",
                    start,
                    e,
                    landing
                );
                if let Err(e) = goto_within(browser, landing, self.timeout).await {
                    tracing::warn!("Could not return to landing page {}: {}", landing, e);
                }
                landing.clone()
            }
        }
    }
}

/// Compares two URLs after normalization
fn same_page(a: &Url, b: &Url) -> bool {
    match (normalize_url(a.as_str()), normalize_url(b.as_str())) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Text of the first matching error element, or the no-redirect marker
fn probe_error_message<B: Browser>(browser: &B) -> String {
    ERROR_PROBES
        .iter()
        .filter_map(|selector| browser.element_text(selector).ok().flatten())
        .find(|text| !text.is_empty())
        .map(|text| truncate_detail(&text))
        .unwrap_or_else(|| LOGIN_FAILED_NO_REDIRECT.to_string())
}
