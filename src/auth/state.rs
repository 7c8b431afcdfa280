use std::fmt;

/// Login/session state of a crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthState {
    /// Nothing sent yet
    Unauthenticated,
    /// Waiting for the login page that carries the CSRF cookie
    FetchingCsrf,
    /// Credentials posted, waiting for the verdict
    LoggingIn,
    /// Waiting for the auto-provisioning endpoint to mint an account
    RequestingAutoAuth,
    /// Session established; pages flow through
    Authenticated,
    /// An unexpected logout was seen; a fresh login is in flight
    ReLoggingIn,
}

impl AuthState {
    /// Returns true while a login exchange is outstanding
    pub fn is_logging_in(&self) -> bool {
        matches!(
            self,
            Self::FetchingCsrf | Self::LoggingIn | Self::RequestingAutoAuth | Self::ReLoggingIn
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::FetchingCsrf => "fetching_csrf",
            Self::LoggingIn => "logging_in",
            Self::RequestingAutoAuth => "requesting_auto_auth",
            Self::Authenticated => "authenticated",
            Self::ReLoggingIn => "re_logging_in",
        }
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_in_states() {
        assert!(AuthState::FetchingCsrf.is_logging_in());
        assert!(AuthState::ReLoggingIn.is_logging_in());
        assert!(!AuthState::Authenticated.is_logging_in());
        assert!(!AuthState::Unauthenticated.is_logging_in());
    }

    #[test]
    fn test_display() {
        assert_eq!(AuthState::RequestingAutoAuth.to_string(), "requesting_auto_auth");
    }
}
