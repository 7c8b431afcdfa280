//! Crawl-session authentication
//!
//! [`AuthController`] is the login state machine: it turns responses into the
//! next requests of the login flow and spots unexpected logouts mid-crawl.
//! [`AuthSession`] owns one controller per run, executes what it emits, and
//! keeps the session's cookies.

mod controller;
mod cookies;
mod session;
mod state;

pub use controller::{AuthController, Credentials, EffectivePage, PageOutcome};
pub use cookies::{last_cookie_value, CookieJar};
pub use session::{AuthSession, PageStep};
pub use state::AuthState;
