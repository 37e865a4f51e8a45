use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};

use crate::error::LoginError;

/// Error page used when no error redirect is configured.
const DEFAULT_ERROR_REDIRECT: &str = "/login";

/// Authentication errors for the middleware layer.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The login attempt ended without an account.
    #[error(transparent)]
    Login(#[from] LoginError),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AuthError {
    /// Short code appended to the error page as `?error=`.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Login(LoginError::UserCancelled) => "cancelled",
            Self::Login(LoginError::MissingEmail) => "noemail",
            Self::Login(LoginError::AccountCreationDisabled) => "noaccountyet",
            Self::Login(LoginError::AccountUnavailable(_)) => "account_unavailable",
            Self::Login(_) => "login_failed",
            Self::Config(_) => "internal",
        }
    }

    /// Render as a redirect to `error_redirect`, or a 500 for internal failures.
    pub fn into_response_with(self, error_redirect: &str) -> Response {
        match self {
            Self::Login(LoginError::Storage(ref e)) => {
                tracing::error!(error = %e, "SSO login storage failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
            }
            Self::Login(ref e) => {
                tracing::warn!(error = %e, code = self.code(), "SSO login stopped");
                let encoded = urlencoding::encode(self.code());
                Redirect::to(&format!("{error_redirect}?error={encoded}")).into_response()
            }
            Self::Config(_) => {
                tracing::error!(error = %self, "Auth internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        self.into_response_with(DEFAULT_ERROR_REDIRECT)
    }
}

impl From<crate::error::Error> for AuthError {
    fn from(e: crate::error::Error) -> Self {
        Self::Config(e.to_string())
    }
}
