#![doc = include_str!("../README.md")]

pub mod error;
pub mod handshake;
pub mod reconcile;
pub mod session;
#[cfg(feature = "client")]
pub mod signing;
#[cfg(feature = "client")]
pub mod sso;
pub mod types;

#[cfg(feature = "axum")]
pub mod middleware;

// Re-exports for convenient access
pub use error::{BoxError, Error, HandshakeFailure, LoginError};
pub use handshake::{
    Handshake, HandshakeState, RestartReason, ReturnQuery, SignedRequestClient, Step,
};
pub use reconcile::{
    AuditLog, LoginAuditEvent, ReconcileOutcome, Reconciler, ReconcilerSettings,
    SessionEstablisher, UserStorage, allow_profile_update,
};
pub use session::{SSO_SESSION_SLOT, SessionSlot, SsoSessionState};
#[cfg(feature = "client")]
pub use sso::{ProviderConfig, SigningMethod, SsoClient};
pub use types::{
    ExternalId, HostId, LocalAccount, NewAccountProfile, RemoteIdentity, RequestToken, UserId,
};
