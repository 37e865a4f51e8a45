use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::BoxError;
use crate::types::RequestToken;

/// Well-known session key the in-flight token pair is kept under.
pub const SSO_SESSION_SLOT: &str = "oauth";

/// Server-side state for one in-flight login attempt.
///
/// `secret` must never leave the server. It is only sent back to the
/// provider, as part of the verifier exchange signature.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SsoSessionState {
    pub key: String,
    pub secret: String,
}

impl SsoSessionState {
    /// Both halves must be present for the state to be usable.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.key.is_empty() && !self.secret.is_empty()
    }

    #[must_use]
    pub fn to_request_token(&self) -> RequestToken {
        RequestToken {
            token: self.key.clone(),
            token_secret: self.secret.clone(),
        }
    }
}

impl From<RequestToken> for SsoSessionState {
    fn from(token: RequestToken) -> Self {
        Self {
            key: token.token,
            secret: token.token_secret,
        }
    }
}

impl std::fmt::Debug for SsoSessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SsoSessionState")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// The current browser session's [`SSO_SESSION_SLOT`].
///
/// One slot per browser session. The handshake only ever reads, writes
/// and deletes this single value.
pub trait SessionSlot: Send + Sync {
    fn load(&self) -> impl Future<Output = Result<Option<SsoSessionState>, BoxError>> + Send;

    fn store(&self, state: SsoSessionState) -> impl Future<Output = Result<(), BoxError>> + Send;

    fn clear(&self) -> impl Future<Output = Result<(), BoxError>> + Send;
}
