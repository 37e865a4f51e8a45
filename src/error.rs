use crate::handshake::HandshakeState;

/// Boxed error returned by consumer-implemented traits.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Signed-request client errors.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The provider answered, but not with a success.
    #[error("VATSIM SSO {operation} failed (status {status:?}): {detail}")]
    Provider {
        operation: &'static str,
        status: Option<u16>,
        detail: String,
    },
    #[cfg(feature = "client")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Signing error: {0}")]
    Signing(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Why a handshake step was rejected.
///
/// All of these are shown to the user as the same generic message;
/// the variant is only for server-side logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HandshakeFailure {
    #[error("no request token was returned")]
    TokenRequest,
    #[error("returned token does not match the stored token")]
    TokenMismatch,
    #[error("verifier missing from return")]
    MissingVerifier,
    #[error("verifier exchange failed")]
    Exchange,
}

/// Terminal outcome of a login attempt that did not produce an account.
#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error("login process failed: {0}")]
    Handshake(HandshakeFailure),

    /// The user pressed cancel at the provider.
    #[error("login cancelled by user")]
    UserCancelled,

    /// The provider did not release an email address.
    #[error("provider returned no email address")]
    MissingEmail,

    #[error("account creation from SSO is disabled")]
    AccountCreationDisabled,

    /// Local login was refused for an existing account (blocked or suspended).
    #[error("account {0} cannot log in")]
    AccountUnavailable(String),

    /// A session slot, user storage or session establisher call failed.
    #[error("storage error: {0}")]
    Storage(#[source] BoxError),
}

impl LoginError {
    /// Message safe to show the end user.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Handshake(HandshakeFailure::TokenMismatch) => {
                "An error occurred with the login process - please try again"
            }
            Self::Handshake(_) | Self::Storage(_) => "An error occurred with the login process",
            Self::UserCancelled => "You cancelled your login",
            Self::MissingEmail => "No email address was provided by VATSIM; login cannot continue",
            Self::AccountCreationDisabled => {
                "You do not have an account yet and new accounts cannot be created"
            }
            Self::AccountUnavailable(_) => "Your account is not allowed to log in",
        }
    }

    /// Handshake state this error leaves the attempt in.
    #[must_use]
    pub fn state(&self) -> HandshakeState {
        match self {
            Self::UserCancelled => HandshakeState::Cancelled,
            _ => HandshakeState::Failed,
        }
    }
}
