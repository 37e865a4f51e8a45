//! Three-step VATSIM SSO handshake: start, redirect, return.
//!
//! ```text
//!  START ──start()──▶ AWAITING_RETURN ──handle_return()──▶ VERIFIED
//!    │                      │   │
//!    └──▶ FAILED ◀──────────┘   └──▶ CANCELLED
//! ```
//!
//! The token secret lives only in the [`SessionSlot`]; the browser
//! carries nothing but the public token key and the verifier.

use std::future::Future;

use serde::Deserialize;
use url::Url;

use crate::error::{Error, HandshakeFailure, LoginError};
use crate::session::{SessionSlot, SsoSessionState};
use crate::types::{RemoteIdentity, RequestToken};

/// Provider operations the handshake needs.
///
/// Signing and transport are the implementor's concern.
/// [`SsoClient`](crate::SsoClient) is the HTTP implementation.
pub trait SignedRequestClient: Send + Sync {
    /// Ask the provider for a request token bound to `return_url`.
    fn request_token(
        &self,
        return_url: &Url,
        allow_suspended: bool,
        allow_inactive: bool,
    ) -> impl Future<Output = Result<RequestToken, Error>> + Send;

    /// Provider page the browser is sent to for `token`.
    fn authorization_url(&self, token: &RequestToken) -> Url;

    /// Trade the verifier for the member's identity.
    fn exchange_verifier(
        &self,
        token: &RequestToken,
        verifier: &str,
    ) -> impl Future<Output = Result<RemoteIdentity, Error>> + Send;
}

/// Where a login attempt is in the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Start,
    AwaitingReturn,
    Verified,
    Cancelled,
    Failed,
}

/// Query parameters the provider appends when sending the browser back.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReturnQuery {
    pub oauth_token: Option<String>,
    pub oauth_verifier: Option<String>,
    pub oauth_cancel: Option<String>,
}

impl ReturnQuery {
    /// Cancellation is signalled by the presence of the flag, whatever its value.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.oauth_cancel.is_some()
    }
}

/// Why a return was treated as a fresh start instead of a verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartReason {
    /// No cancellation flag and no verifier: a plain visit to the login hook.
    NoVerifier,
    /// A verifier arrived but this browser session holds no token pair,
    /// usually because the session expired while the user was at the provider.
    NoStoredState,
}

/// Successful result of a handshake step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// A request token is stored; send the browser to `authorization_url`.
    AwaitingReturn { authorization_url: Url },
    /// Same as `AwaitingReturn`, reached from [`Handshake::handle_return`].
    Restarted {
        reason: RestartReason,
        authorization_url: Url,
    },
    /// The provider vouched for this identity.
    Verified(RemoteIdentity),
}

impl Step {
    #[must_use]
    pub fn state(&self) -> HandshakeState {
        match self {
            Self::AwaitingReturn { .. } | Self::Restarted { .. } => HandshakeState::AwaitingReturn,
            Self::Verified(_) => HandshakeState::Verified,
        }
    }

    /// Redirect target, if the browser has to go to the provider.
    #[must_use]
    pub fn authorization_url(&self) -> Option<&Url> {
        match self {
            Self::AwaitingReturn { authorization_url }
            | Self::Restarted {
                authorization_url, ..
            } => Some(authorization_url),
            Self::Verified(_) => None,
        }
    }
}

/// Handshake controller.
///
/// Holds no per-user state; everything per attempt goes through the
/// [`SessionSlot`] passed to each call.
pub struct Handshake<C> {
    client: C,
    return_url: Url,
    allow_suspended: bool,
    allow_inactive: bool,
}

impl<C: SignedRequestClient> Handshake<C> {
    /// Suspended and inactive members are refused by the provider by default.
    #[must_use]
    pub fn new(client: C, return_url: Url) -> Self {
        Self {
            client,
            return_url,
            allow_suspended: false,
            allow_inactive: false,
        }
    }

    #[must_use]
    pub fn with_allow_suspended(mut self, allow: bool) -> Self {
        self.allow_suspended = allow;
        self
    }

    #[must_use]
    pub fn with_allow_inactive(mut self, allow: bool) -> Self {
        self.allow_inactive = allow;
        self
    }

    #[must_use]
    pub fn client(&self) -> &C {
        &self.client
    }

    #[must_use]
    pub fn return_url(&self) -> &Url {
        &self.return_url
    }

    /// Obtain a request token, store it in `slot`, and return the provider redirect.
    ///
    /// # Errors
    ///
    /// [`LoginError::Handshake`] if the provider issues no token,
    /// [`LoginError::Storage`] if the slot cannot be written.
    pub async fn start<S: SessionSlot>(&self, slot: &S) -> Result<Step, LoginError> {
        let authorization_url = self.begin(slot).await?;
        Ok(Step::AwaitingReturn { authorization_url })
    }

    /// Process the browser's return from the provider.
    ///
    /// The stored token pair is deleted right after the exchange attempt,
    /// whatever its outcome. A token mismatch is rejected before anything
    /// is consumed.
    ///
    /// # Errors
    ///
    /// [`LoginError::UserCancelled`] when the cancel flag is present;
    /// [`LoginError::Handshake`] on token mismatch, empty verifier,
    /// or a failed exchange; [`LoginError::Storage`] on slot failures.
    pub async fn handle_return<S: SessionSlot>(
        &self,
        slot: &S,
        query: &ReturnQuery,
    ) -> Result<Step, LoginError> {
        if query.is_cancelled() {
            tracing::warn!("VATSIM login cancelled by user");
            return Err(LoginError::UserCancelled);
        }

        let Some(verifier) = query.oauth_verifier.as_deref() else {
            return self.restart(slot, RestartReason::NoVerifier).await;
        };

        let stored = slot
            .load()
            .await
            .map_err(LoginError::Storage)?
            .filter(SsoSessionState::is_complete);

        let Some(stored) = stored else {
            tracing::warn!("VATSIM return without stored token; restarting handshake");
            return self.restart(slot, RestartReason::NoStoredState).await;
        };

        if query.oauth_token.as_deref() != Some(stored.key.as_str()) {
            tracing::warn!("VATSIM token mismatch on return");
            return Err(LoginError::Handshake(HandshakeFailure::TokenMismatch));
        }

        if verifier.is_empty() {
            tracing::warn!("VATSIM return with empty verifier");
            return Err(LoginError::Handshake(HandshakeFailure::MissingVerifier));
        }

        let exchanged = self
            .client
            .exchange_verifier(&stored.to_request_token(), verifier)
            .await;

        // One-time use: the token is dead whether or not the exchange worked.
        let cleared = slot.clear().await;

        let identity = match (exchanged, cleared) {
            (Ok(identity), Ok(())) => identity,
            (Ok(_), Err(e)) => return Err(LoginError::Storage(e)),
            (Err(e), cleared) => {
                tracing::error!(error = %e, "VATSIM verifier exchange failed");
                if let Err(clear_err) = cleared {
                    tracing::error!(error = %clear_err, "Failed to clear SSO session state");
                }
                return Err(LoginError::Handshake(HandshakeFailure::Exchange));
            }
        };

        tracing::info!(external_id = %identity.external_id, "VATSIM identity verified");
        Ok(Step::Verified(identity))
    }

    async fn restart<S: SessionSlot>(
        &self,
        slot: &S,
        reason: RestartReason,
    ) -> Result<Step, LoginError> {
        let authorization_url = self.begin(slot).await?;
        Ok(Step::Restarted {
            reason,
            authorization_url,
        })
    }

    async fn begin<S: SessionSlot>(&self, slot: &S) -> Result<Url, LoginError> {
        let token: RequestToken = self
            .client
            .request_token(&self.return_url, self.allow_suspended, self.allow_inactive)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "VATSIM request token failed");
                LoginError::Handshake(HandshakeFailure::TokenRequest)
            })?;
        let authorization_url = self.client.authorization_url(&token);

        slot.store(SsoSessionState::from(token))
            .await
            .map_err(LoginError::Storage)?;

        Ok(authorization_url)
    }
}
