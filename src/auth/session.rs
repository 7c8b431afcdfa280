use crate::auth::controller::{AuthController, Credentials, EffectivePage, PageOutcome};
use crate::auth::{AuthState, CookieJar};
use crate::crawler::{PageFetcher, Request, Response};
use crate::{Result, SweepError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Result of running one page request through the session
#[derive(Debug)]
pub enum PageStep {
    /// The page was fetched under a valid session
    Page(EffectivePage),
    /// The session expired and was re-established; fetch these again
    Resume(Vec<Request>),
}

/// The crawl session shared by every page pipeline
///
/// Wraps the [`AuthController`] and the cookie jar, and executes the requests
/// the controller emits. Re-logins are single-flight: pipelines that hit the
/// login wall together wait on one latch, and only the first performs the
/// login POST. The others notice the epoch moved and just re-fetch.
pub struct AuthSession {
    controller: Mutex<AuthController>,
    jar: Mutex<CookieJar>,
    relogin: tokio::sync::Mutex<()>,
    epoch: AtomicU64,
    fetcher: Arc<dyn PageFetcher>,
}

impl AuthSession {
    pub fn new(controller: AuthController, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            controller: Mutex::new(controller),
            jar: Mutex::new(CookieJar::new()),
            relogin: tokio::sync::Mutex::new(()),
            epoch: AtomicU64::new(0),
            fetcher,
        }
    }

    pub fn state(&self) -> AuthState {
        self.controller().state()
    }

    /// Number of completed logins, initial login included
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Runs the login flow and returns the first crawl requests
    pub async fn establish(&self, credentials: Credentials) -> Result<Vec<Request>> {
        let first = self.controller().start(credentials)?;
        let response = self.send(first).await?;

        let state = self.state();
        let next = match state {
            AuthState::RequestingAutoAuth => {
                let (_, next) = self.controller().on_auto_auth_response(&response)?;
                next
            }
            AuthState::FetchingCsrf => {
                let login = self.controller().on_csrf_page(&response)?;
                let verdict = self.send(login).await?;
                let next = self.controller().on_login_result(&verdict)?;
                next
            }
            other => {
                return Err(SweepError::Protocol(format!(
                    "Login flow stalled in state {}",
                    other
                )))
            }
        };

        self.epoch.fetch_add(1, Ordering::SeqCst);
        Ok(next)
    }

    /// Fetches a page, transparently re-logging in if the session expired
    pub async fn fetch_page(&self, request: Request) -> Result<PageStep> {
        let seen_epoch = self.epoch();
        let response = self.send(request).await?;

        if !self.controller().is_logout(&response) {
            let outcome = self.controller().on_page_response(&response)?;
            if let PageOutcome::Page(page) = outcome {
                return Ok(PageStep::Page(page));
            }
        }

        let _latch = self.relogin.lock().await;

        if self.epoch() != seen_epoch {
            tracing::debug!("Session was re-established while waiting; re-fetching");
            let resume = self.controller().resume_request(&response)?;
            return Ok(PageStep::Resume(resume.into_iter().collect()));
        }

        let fallback = {
            let name = self.controller().csrf_cookie().to_string();
            self.jar().get(&name, &response.url).map(str::to_string)
        };
        let outcome = {
            let mut controller = self.controller();
            if let Some(token) = fallback {
                controller.remember_csrf_token(token);
            }
            controller.on_page_response(&response)?
        };
        match outcome {
            PageOutcome::Relogin(login) => self.relogin(login).await,
            PageOutcome::Page(page) => Ok(PageStep::Page(page)),
        }
    }

    async fn relogin(&self, login: Request) -> Result<PageStep> {
        let verdict = self.send(login).await?;
        let resume = self.controller().on_login_result(&verdict)?;
        self.epoch.fetch_add(1, Ordering::SeqCst);
        Ok(PageStep::Resume(resume))
    }

    /// Sends a request with the session's cookies and records the ones it sets
    pub async fn send(&self, mut request: Request) -> Result<Response> {
        self.jar().decorate(&mut request);
        let response = self.fetcher.fetch(&request).await?;
        self.jar().store_from(&response);
        Ok(response)
    }

    fn controller(&self) -> MutexGuard<'_, AuthController> {
        self.controller.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn jar(&self) -> MutexGuard<'_, CookieJar> {
        self.jar.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
