use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;

use super::config::AuthSettings;
use super::traits::SsoStateStore;
use crate::handshake::Handshake;
use crate::reconcile::{AuditLog, Reconciler, SessionEstablisher, UserStorage};
use crate::sso::SsoClient;

/// Shared state for the SSO route handlers.
pub(super) struct AuthState<U, E, A, T> {
    pub(super) handshake: Arc<Handshake<SsoClient>>,
    pub(super) reconciler: Arc<Reconciler<U, E, A>>,
    pub(super) state_store: Arc<T>,
    pub(super) settings: AuthSettings,
}

// Manual Clone: avoid derive adding `U: Clone, E: Clone, ...` bounds.
impl<U, E, A, T> Clone for AuthState<U, E, A, T> {
    fn clone(&self) -> Self {
        Self {
            handshake: self.handshake.clone(),
            reconciler: self.reconciler.clone(),
            state_store: self.state_store.clone(),
            settings: self.settings.clone(),
        }
    }
}

// PrivateCookieJar requires Key to be extractable from state
impl<U, E, A, T> FromRef<AuthState<U, E, A, T>> for Key
where
    U: UserStorage,
    E: SessionEstablisher,
    A: AuditLog,
    T: SsoStateStore,
{
    fn from_ref(state: &AuthState<U, E, A, T>) -> Self {
        state.settings.cookie_key.clone()
    }
}
