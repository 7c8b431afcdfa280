use crate::auth::cookies::last_cookie_value;
use crate::auth::AuthState;
use crate::config::AuthConfig;
use crate::crawler::{extract_title, Request, Response};
use crate::url::{query_param, NEXT_PARAM};
use crate::{ConfigError, Result, SweepError};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

/// Login identity for a run
///
/// Either both fields are present or neither is; once resolved (from
/// configuration or auto-provisioning) they are reused for every re-login.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            password: Some(password.into()),
        }
    }

    /// No credentials: the controller falls back to auto-auth
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_complete(&self) -> bool {
        self.email.is_some() && self.password.is_some()
    }

    fn pair(&self) -> Option<(&str, &str)> {
        Some((self.email.as_deref()?, self.password.as_deref()?))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email.as_ref().map(|_| "<redacted>"))
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// A fetched page the crawl may proceed with
#[derive(Debug, Clone)]
pub struct EffectivePage {
    pub url: Url,
    pub status: u16,
    pub title: Option<String>,
    /// Headers the page was requested with, replayed to the checker
    pub request_headers: BTreeMap<String, String>,
    pub content_type: String,
    pub body: String,
    pub depth: u32,
}

/// What the controller makes of an ordinary page response
#[derive(Debug, Clone)]
pub enum PageOutcome {
    Page(EffectivePage),
    /// The session expired; this login POST must run before the crawl resumes
    Relogin(Request),
}

/// Login/session state machine
///
/// Pure with respect to I/O: every method consumes a [`Response`] and emits
/// the [`Request`]s that should run next. The caller executes them.
#[derive(Debug)]
pub struct AuthController {
    config: AuthConfig,
    base_url: Url,
    state: AuthState,
    credentials: Option<Credentials>,
    csrf_token: Option<String>,
    deferred: Vec<Request>,
    resume: Option<Request>,
}

impl AuthController {
    /// Creates a controller; `start_requests` run once the session is established
    pub fn new(config: AuthConfig, base_url: Url, start_requests: Vec<Request>) -> Self {
        Self {
            config,
            base_url,
            state: AuthState::Unauthenticated,
            credentials: None,
            csrf_token: None,
            deferred: start_requests,
            resume: None,
        }
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn login_path(&self) -> &str {
        &self.config.login_path
    }

    /// Name of the cookie carrying the CSRF token
    pub fn csrf_cookie(&self) -> &str {
        &self.config.csrf_cookie
    }

    /// Remembers a CSRF token to fall back on when a login wall sets none
    pub fn remember_csrf_token(&mut self, token: impl Into<String>) {
        self.csrf_token = Some(token.into());
    }

    /// Emits the first request of the login flow
    ///
    /// Both credentials present: GET the login page for its CSRF cookie.
    /// Neither present: GET the auto-provisioning endpoint as JSON.
    pub fn start(&mut self, credentials: Credentials) -> Result<Request> {
        match (credentials.email.is_some(), credentials.password.is_some()) {
            (true, true) => {
                let url = self.endpoint(&self.config.login_path)?;
                self.credentials = Some(credentials);
                self.state = AuthState::FetchingCsrf;
                Ok(Request::get(url))
            }
            (false, false) => {
                let mut url = self.endpoint(&self.config.auto_auth_path)?;
                if !self.config.auto_auth_params.is_empty() {
                    url.query_pairs_mut()
                        .extend_pairs(self.config.auto_auth_params.iter());
                }
                self.state = AuthState::RequestingAutoAuth;
                Ok(Request::get(url).with_header("Accept", "application/json"))
            }
            _ => Err(SweepError::Config(ConfigError::Validation(
                "Both email and password are required, or neither to use auto-auth".to_string(),
            ))),
        }
    }

    /// Harvests the CSRF cookie from the login page and posts the credentials
    pub fn on_csrf_page(&mut self, response: &Response) -> Result<Request> {
        self.expect_state(AuthState::FetchingCsrf)?;

        let token = last_cookie_value(response, &self.config.csrf_cookie).ok_or_else(|| {
            SweepError::Protocol(format!(
                "No '{}' cookie on the login page {}",
                self.config.csrf_cookie, response.url
            ))
        })?;

        let request = self.login_request(&token, None)?;
        self.csrf_token = Some(token);
        self.state = AuthState::LoggingIn;
        Ok(request)
    }

    /// Resolves credentials from the auto-provisioning endpoint
    ///
    /// Returns the credentials and the deferred start requests.
    pub fn on_auto_auth_response(
        &mut self,
        response: &Response,
    ) -> Result<(Credentials, Vec<Request>)> {
        self.expect_state(AuthState::RequestingAutoAuth)?;

        let credentials: Credentials = serde_json::from_str(&response.body).map_err(|e| {
            SweepError::Protocol(format!("Malformed auto-auth response: {}", e))
        })?;

        if !credentials.is_complete() {
            return Err(SweepError::Protocol(
                "Auto-auth response is missing email or password".to_string(),
            ));
        }

        if let Some(token) = last_cookie_value(response, &self.config.csrf_cookie) {
            self.csrf_token = Some(token);
        }
        self.credentials = Some(credentials.clone());
        self.state = AuthState::Authenticated;
        tracing::info!("Auto-auth succeeded");

        Ok((credentials, std::mem::take(&mut self.deferred)))
    }

    /// Interprets the login endpoint's verdict
    ///
    /// On success returns the deferred start requests, or after a re-login
    /// the request for the page whose fetch hit the login wall.
    pub fn on_login_result(&mut self, response: &Response) -> Result<Vec<Request>> {
        if !matches!(self.state, AuthState::LoggingIn | AuthState::ReLoggingIn) {
            return Err(self.unexpected_state());
        }

        if response.status == 401 || response.status == 403 {
            tracing::error!(
                "Credentials failed. Either add/update the current credentials or remove them to enable auto auth"
            );
            return Err(self.fail_login(format!("login rejected with HTTP {}", response.status)));
        }

        if response.body.contains(&self.config.failure_marker) {
            return Err(self.fail_login("login rejected by the application".to_string()));
        }

        if response.status >= 400 {
            return Err(SweepError::Protocol(format!(
                "Login endpoint returned HTTP {}",
                response.status
            )));
        }

        let relogin = self.state == AuthState::ReLoggingIn;
        self.state = AuthState::Authenticated;
        tracing::info!("Login succeeded: true");

        if relogin {
            Ok(self.resume.take().into_iter().collect())
        } else {
            Ok(std::mem::take(&mut self.deferred))
        }
    }

    /// Returns true if a response landed on the login page
    pub fn is_logout(&self, response: &Response) -> bool {
        response.url.path() == self.config.login_path
    }

    /// The page a logged-out response should resume at
    ///
    /// Taken from the `next` parameter when present, else the URL that was
    /// originally requested (unless that was the login page itself).
    pub fn resume_request(&self, response: &Response) -> Result<Option<Request>> {
        let target = match query_param(&response.url, NEXT_PARAM) {
            Some(path) => Some(self.base_url.join(&path)?),
            None if response.requested_url.path() != self.config.login_path => {
                Some(response.requested_url.clone())
            }
            None => None,
        };

        Ok(target.map(|url| Request::get(url).with_depth(response.depth)))
    }

    /// Per-page entry point
    ///
    /// A response landing on the login page means the session expired: the
    /// controller re-logs in and remembers the page to resume at. Anything
    /// else passes through as an [`EffectivePage`].
    pub fn on_page_response(&mut self, response: &Response) -> Result<PageOutcome> {
        if !self.is_logout(response) {
            return Ok(PageOutcome::Page(self.effective_page(response)));
        }

        let resume = self.resume_request(response)?;
        tracing::warn!(
            "Unexpected logout at {}; logging in again (resume at {})",
            response.requested_url,
            resume.as_ref().map(|r| r.url.as_str()).unwrap_or("-")
        );

        let token = last_cookie_value(response, &self.config.csrf_cookie)
            .or_else(|| self.csrf_token.clone())
            .ok_or_else(|| {
                SweepError::Protocol(format!(
                    "No '{}' cookie available to log in again",
                    self.config.csrf_cookie
                ))
            })?;

        let next = query_param(&response.url, NEXT_PARAM);
        let request = self.login_request(&token, next.as_deref())?;
        self.csrf_token = Some(token);
        self.resume = resume;
        self.state = AuthState::ReLoggingIn;
        Ok(PageOutcome::Relogin(request))
    }

    fn effective_page(&self, response: &Response) -> EffectivePage {
        let title = if response.is_html() {
            extract_title(&response.body)
        } else {
            None
        };

        EffectivePage {
            url: response.url.clone(),
            status: response.status,
            title,
            request_headers: response.request_headers.clone(),
            content_type: response.content_type().to_string(),
            body: response.body.clone(),
            depth: response.depth,
        }
    }

    /// Builds the CSRF-protected credentials POST
    fn login_request(&self, token: &str, next: Option<&str>) -> Result<Request> {
        let (email, password) = self
            .credentials
            .as_ref()
            .and_then(Credentials::pair)
            .ok_or_else(|| SweepError::Protocol("No credentials resolved to log in with".to_string()))?;

        let mut url = self.endpoint(&self.config.login_session_path)?;
        if let Some(next) = next {
            url.query_pairs_mut().append_pair(NEXT_PARAM, next);
        }

        Ok(
            Request::post_form(url, [("email", email), ("password", password)])
                .with_header(self.config.csrf_header.clone(), token),
        )
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    fn expect_state(&self, expected: AuthState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(self.unexpected_state())
        }
    }

    fn unexpected_state(&self) -> SweepError {
        SweepError::Protocol(format!("Unexpected response in auth state {}", self.state))
    }

    fn fail_login(&mut self, reason: String) -> SweepError {
        self.state = AuthState::Unauthenticated;
        tracing::info!("Login succeeded: false");
        SweepError::AuthFailure(reason)
    }
}
