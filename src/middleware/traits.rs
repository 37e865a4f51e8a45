use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use super::cookies;
use crate::error::BoxError;
use crate::session::{SSO_SESSION_SLOT, SessionSlot, SsoSessionState};

/// Consumer-provided server-side store for in-flight handshakes.
///
/// Entries are keyed by an opaque browser session id (from an encrypted
/// cookie) and a slot name. Expiry is the store's concern; entries only
/// need to outlive one trip to VATSIM.
///
/// # Example
///
/// ```rust,ignore
/// impl SsoStateStore for RedisStates {
///     async fn get(&self, browser_session: &str, slot: &str)
///         -> Result<Option<SsoSessionState>, BoxError>
///     {
///         let raw: Option<String> = self.conn().get(format!("{browser_session}:{slot}")).await?;
///         Ok(raw.map(|r| serde_json::from_str(&r)).transpose()?)
///     }
///     // ...
/// }
/// ```
pub trait SsoStateStore: Send + Sync + 'static {
    fn get(
        &self,
        browser_session: &str,
        slot: &str,
    ) -> impl Future<Output = Result<Option<SsoSessionState>, BoxError>> + Send;

    fn set(
        &self,
        browser_session: &str,
        slot: &str,
        state: SsoSessionState,
    ) -> impl Future<Output = Result<(), BoxError>> + Send;

    fn delete(
        &self,
        browser_session: &str,
        slot: &str,
    ) -> impl Future<Output = Result<(), BoxError>> + Send;
}

/// In-process [`SsoStateStore`] for single-node deployments and tests.
///
/// Entries expire after the handshake cookie lifetime. Expired entries
/// read back as `None` and are swept on every write.
#[derive(Debug)]
pub struct MemoryStateStore {
    entries: DashMap<(String, String), StoredState>,
    ttl: Duration,
}

#[derive(Debug)]
struct StoredState {
    state: SsoSessionState,
    stored_at: Instant,
}

impl StoredState {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.stored_at.elapsed() >= ttl
    }
}

impl Default for MemoryStateStore {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
            ttl: cookies::HANDSHAKE_TTL,
        }
    }
}

impl MemoryStateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// How long an in-flight handshake is kept.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Number of stored entries, expired ones not yet swept included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn sweep(&self) {
        self.entries.retain(|_, stored| !stored.is_expired(self.ttl));
    }
}

impl SsoStateStore for MemoryStateStore {
    async fn get(
        &self,
        browser_session: &str,
        slot: &str,
    ) -> Result<Option<SsoSessionState>, BoxError> {
        let key = (browser_session.to_string(), slot.to_string());
        if let Some(stored) = self.entries.get(&key) {
            if !stored.is_expired(self.ttl) {
                return Ok(Some(stored.state.clone()));
            }
        }
        self.entries
            .remove_if(&key, |_, stored| stored.is_expired(self.ttl));
        Ok(None)
    }

    async fn set(
        &self,
        browser_session: &str,
        slot: &str,
        state: SsoSessionState,
    ) -> Result<(), BoxError> {
        self.sweep();
        self.entries.insert(
            (browser_session.to_string(), slot.to_string()),
            StoredState {
                state,
                stored_at: Instant::now(),
            },
        );
        Ok(())
    }

    async fn delete(&self, browser_session: &str, slot: &str) -> Result<(), BoxError> {
        self.entries
            .remove(&(browser_session.to_string(), slot.to_string()));
        Ok(())
    }
}

impl<T: SsoStateStore> SsoStateStore for Arc<T> {
    fn get(
        &self,
        browser_session: &str,
        slot: &str,
    ) -> impl Future<Output = Result<Option<SsoSessionState>, BoxError>> + Send {
        T::get(self, browser_session, slot)
    }

    fn set(
        &self,
        browser_session: &str,
        slot: &str,
        state: SsoSessionState,
    ) -> impl Future<Output = Result<(), BoxError>> + Send {
        T::set(self, browser_session, slot, state)
    }

    fn delete(
        &self,
        browser_session: &str,
        slot: &str,
    ) -> impl Future<Output = Result<(), BoxError>> + Send {
        T::delete(self, browser_session, slot)
    }
}

/// One browser's [`SSO_SESSION_SLOT`] in a [`SsoStateStore`].
pub(super) struct BrowserSlot<'a, T> {
    store: &'a T,
    browser_session: &'a str,
}

impl<'a, T: SsoStateStore> BrowserSlot<'a, T> {
    pub(super) fn new(store: &'a T, browser_session: &'a str) -> Self {
        Self {
            store,
            browser_session,
        }
    }
}

impl<T: SsoStateStore> SessionSlot for BrowserSlot<'_, T> {
    async fn load(&self) -> Result<Option<SsoSessionState>, BoxError> {
        self.store.get(self.browser_session, SSO_SESSION_SLOT).await
    }

    async fn store(&self, state: SsoSessionState) -> Result<(), BoxError> {
        self.store
            .set(self.browser_session, SSO_SESSION_SLOT, state)
            .await
    }

    async fn clear(&self) -> Result<(), BoxError> {
        self.store.delete(self.browser_session, SSO_SESSION_SLOT).await
    }
}
