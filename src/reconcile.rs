//! Mapping a verified VATSIM identity onto a local account.

use std::future::Future;

use crate::error::{BoxError, LoginError};
use crate::types::{HostId, LocalAccount, NewAccountProfile, RemoteIdentity, UserId};

/// Consumer-provided user storage.
///
/// # Example
///
/// ```rust,ignore
/// impl UserStorage for MyRepo {
///     async fn find_by_username(&self, username: &str, host: HostId)
///         -> Result<Option<LocalAccount>, BoxError>
///     {
///         Ok(self.users.by_username(username, host.0).await?)
///     }
///     // ...
/// }
/// ```
pub trait UserStorage: Send + Sync {
    /// Look up the account with this username on `host`.
    ///
    /// Deleted rows may be returned; the reconciler ignores them.
    fn find_by_username(
        &self,
        username: &str,
        host: HostId,
    ) -> impl Future<Output = Result<Option<LocalAccount>, BoxError>> + Send;

    /// Create a bare account with no local password.
    fn create_external(
        &self,
        username: &str,
        host: HostId,
        auth_method: &str,
    ) -> impl Future<Output = Result<LocalAccount, BoxError>> + Send;

    /// Persist the staged profile fields on the account.
    fn update_profile(
        &self,
        id: &UserId,
        profile: &NewAccountProfile,
    ) -> impl Future<Output = Result<(), BoxError>> + Send;
}

/// Consumer-provided local login.
pub trait SessionEstablisher: Send + Sync {
    /// Load the full account for login. `None` if the account is blocked or suspended.
    fn authenticate(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<Option<LocalAccount>, BoxError>> + Send;

    /// Mark the user as logged in. Returns the new session ID.
    fn complete_login(
        &self,
        account: &LocalAccount,
    ) -> impl Future<Output = Result<String, BoxError>> + Send;
}

/// One SSO login event, for the host's audit trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginAuditEvent {
    pub external_id: String,
    pub email: String,
}

/// Consumer-provided audit trail.
pub trait AuditLog: Send + Sync {
    fn record_login(
        &self,
        event: &LoginAuditEvent,
    ) -> impl Future<Output = Result<(), BoxError>> + Send;
}

/// No audit trail.
impl AuditLog for () {
    async fn record_login(&self, _event: &LoginAuditEvent) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Site policy for SSO accounts.
#[derive(Debug, Clone)]
pub struct ReconcilerSettings {
    pub local_host: HostId,
    pub allow_account_creation: bool,
    pub auth_method: String,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            local_host: HostId(1),
            allow_account_creation: true,
            auth_method: "vatsim".into(),
        }
    }
}

/// Account an identity resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Matched by CID. Remote profile data was not applied.
    Existing(LocalAccount),
    /// Created on this login, with `profile` merged in.
    Created {
        account: LocalAccount,
        profile: NewAccountProfile,
    },
}

impl ReconcileOutcome {
    #[must_use]
    pub fn account(&self) -> &LocalAccount {
        match self {
            Self::Existing(account) | Self::Created { account, .. } => account,
        }
    }

    #[must_use]
    pub fn into_account(self) -> LocalAccount {
        match self {
            Self::Existing(account) | Self::Created { account, .. } => account,
        }
    }

    #[must_use]
    pub fn is_new(&self) -> bool {
        matches!(self, Self::Created { .. })
    }
}

/// Identity reconciler.
pub struct Reconciler<U, E, A = ()> {
    storage: U,
    establisher: E,
    audit: A,
    settings: ReconcilerSettings,
}

impl<U: UserStorage, E: SessionEstablisher> Reconciler<U, E> {
    #[must_use]
    pub fn new(storage: U, establisher: E, settings: ReconcilerSettings) -> Self {
        Self {
            storage,
            establisher,
            audit: (),
            settings,
        }
    }
}

impl<U: UserStorage, E: SessionEstablisher, A: AuditLog> Reconciler<U, E, A> {
    #[must_use]
    pub fn with_audit<A2: AuditLog>(self, audit: A2) -> Reconciler<U, E, A2> {
        Reconciler {
            storage: self.storage,
            establisher: self.establisher,
            audit,
            settings: self.settings,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &ReconcilerSettings {
        &self.settings
    }

    #[must_use]
    pub fn establisher(&self) -> &E {
        &self.establisher
    }

    /// Resolve `identity` to a local account, creating one if policy allows.
    ///
    /// # Errors
    ///
    /// - [`LoginError::MissingEmail`] if the identity has no email
    /// - [`LoginError::AccountCreationDisabled`] if no account exists and creation is off
    /// - [`LoginError::AccountUnavailable`] if local login is refused
    /// - [`LoginError::Storage`] if storage or the establisher fails
    pub async fn reconcile(
        &self,
        identity: &RemoteIdentity,
    ) -> Result<ReconcileOutcome, LoginError> {
        if identity.email.trim().is_empty() {
            tracing::warn!(external_id = %identity.external_id, "VATSIM identity has no email");
            return Err(LoginError::MissingEmail);
        }

        let host = self.settings.local_host;
        let existing = self
            .storage
            .find_by_username(identity.external_id.as_str(), host)
            .await
            .map_err(LoginError::Storage)?
            .filter(|account| !account.deleted && account.host == host);

        let (username, staged) = match existing {
            Some(account) => (account.username, None),
            None => {
                if !self.settings.allow_account_creation {
                    tracing::warn!(
                        external_id = %identity.external_id,
                        "No local account and SSO account creation is disabled"
                    );
                    return Err(LoginError::AccountCreationDisabled);
                }

                let created = self
                    .storage
                    .create_external(
                        identity.external_id.as_str(),
                        host,
                        &self.settings.auth_method,
                    )
                    .await
                    .map_err(LoginError::Storage)?;

                tracing::info!(
                    user_id = %created.id,
                    username = %created.username,
                    "Created account from VATSIM SSO"
                );
                (created.username, Some(NewAccountProfile::from_identity(identity)))
            }
        };

        let event = LoginAuditEvent {
            external_id: identity.external_id.to_string(),
            email: identity.email.clone(),
        };
        if let Err(e) = self.audit.record_login(&event).await {
            tracing::warn!(
                error = %e,
                external_id = %event.external_id,
                "Audit entry for SSO login failed"
            );
        }

        let mut account = self
            .establisher
            .authenticate(&username)
            .await
            .map_err(LoginError::Storage)?
            .ok_or_else(|| {
                tracing::warn!(username = %username, "Local login refused for SSO account");
                LoginError::AccountUnavailable(username.clone())
            })?;

        let Some(profile) = staged else {
            return Ok(ReconcileOutcome::Existing(account));
        };

        self.storage
            .update_profile(&account.id, &profile)
            .await
            .map_err(LoginError::Storage)?;
        profile.apply_to(&mut account);

        Ok(ReconcileOutcome::Created { account, profile })
    }

    /// See [`allow_profile_update`].
    #[must_use]
    pub fn guard_update(&self, old: &LocalAccount, new: &LocalAccount) -> bool {
        allow_profile_update(old, new)
    }
}

/// Update hook for profile changes made through the SSO path.
///
/// Returns `false` (reject) if the update would change the email address.
/// The email is owned by VATSIM; letting it change here would let the SSO
/// channel redirect notifications and account recovery.
#[must_use]
pub fn allow_profile_update(old: &LocalAccount, new: &LocalAccount) -> bool {
    old.email == new.email
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Clone, Default)]
    struct Directory {
        accounts: Arc<Mutex<Vec<LocalAccount>>>,
        blocked: Arc<Mutex<Vec<String>>>,
        audit: Arc<Mutex<Vec<LoginAuditEvent>>>,
        authenticated: Arc<Mutex<Vec<String>>>,
    }

    impl Directory {
        fn with_account(account: LocalAccount) -> Self {
            let dir = Self::default();
            dir.accounts.lock().unwrap().push(account);
            dir
        }

        fn count(&self) -> usize {
            self.accounts.lock().unwrap().len()
        }
    }

    impl UserStorage for Directory {
        async fn find_by_username(
            &self,
            username: &str,
            host: HostId,
        ) -> Result<Option<LocalAccount>, BoxError> {
            Ok(self
                .accounts
                .lock()
                .unwrap()
                .iter()
                .find(|a| a.username == username && a.host == host)
                .cloned())
        }

        async fn create_external(
            &self,
            username: &str,
            host: HostId,
            auth_method: &str,
        ) -> Result<LocalAccount, BoxError> {
            let mut accounts = self.accounts.lock().unwrap();
            let account = LocalAccount::bare(
                format!("u{}", accounts.len() + 1),
                username,
                host,
                auth_method,
            );
            accounts.push(account.clone());
            Ok(account)
        }

        async fn update_profile(
            &self,
            id: &UserId,
            profile: &NewAccountProfile,
        ) -> Result<(), BoxError> {
            let mut accounts = self.accounts.lock().unwrap();
            let account = accounts
                .iter_mut()
                .find(|a| &a.id == id)
                .ok_or("no such account")?;
            profile.apply_to(account);
            Ok(())
        }
    }

    impl SessionEstablisher for Directory {
        async fn authenticate(&self, username: &str) -> Result<Option<LocalAccount>, BoxError> {
            self.authenticated.lock().unwrap().push(username.to_string());
            if self.blocked.lock().unwrap().iter().any(|b| b == username) {
                return Ok(None);
            }
            Ok(self
                .accounts
                .lock()
                .unwrap()
                .iter()
                .find(|a| a.username == username && !a.deleted)
                .cloned())
        }

        async fn complete_login(&self, account: &LocalAccount) -> Result<String, BoxError> {
            Ok(format!("sess-{}", account.id))
        }
    }

    impl AuditLog for Directory {
        async fn record_login(&self, event: &LoginAuditEvent) -> Result<(), BoxError> {
            self.audit.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    fn reconciler(
        dir: &Directory,
        allow_creation: bool,
    ) -> Reconciler<Directory, Directory, Directory> {
        Reconciler::new(
            dir.clone(),
            dir.clone(),
            ReconcilerSettings {
                allow_account_creation: allow_creation,
                ..ReconcilerSettings::default()
            },
        )
        .with_audit(dir.clone())
    }

    fn pilot() -> RemoteIdentity {
        RemoteIdentity::new("800123")
            .with_email("p@vatsim.example")
            .with_name("Pat", "Pilot")
            .with_country_code("GB")
    }

    fn existing_account() -> LocalAccount {
        let mut account = LocalAccount::bare("u9", "800123", HostId(1), "vatsim");
        account.email = "old@site.example".into();
        account.first_name = "Patricia".into();
        account.last_name = "Local".into();
        account
    }

    #[tokio::test]
    async fn creates_account_on_first_login() {
        let dir = Directory::default();

        let outcome = reconciler(&dir, true).reconcile(&pilot()).await.unwrap();

        assert!(outcome.is_new());
        let account = outcome.account();
        assert_eq!(account.username, "800123");
        assert_eq!(account.auth_method, "vatsim");
        assert_eq!(account.email, "p@vatsim.example");
        assert_eq!(account.country, "GB");
        let stored = dir.accounts.lock().unwrap()[0].clone();
        assert_eq!(&stored, account);
        assert_eq!(*dir.authenticated.lock().unwrap(), vec!["800123".to_string()]);
        assert_eq!(
            *dir.audit.lock().unwrap(),
            vec![LoginAuditEvent {
                external_id: "800123".into(),
                email: "p@vatsim.example".into(),
            }]
        );
    }

    #[tokio::test]
    async fn second_login_finds_existing_account() {
        let dir = Directory::default();
        let rec = reconciler(&dir, true);
        rec.reconcile(&pilot()).await.unwrap();

        let changed = pilot().with_name("Renamed", "Elsewhere");
        let outcome = rec.reconcile(&changed).await.unwrap();

        assert!(!outcome.is_new());
        assert_eq!(dir.count(), 1);
        assert_eq!(outcome.account().first_name, "Pat");
    }

    #[tokio::test]
    async fn existing_profile_is_not_overwritten() {
        let dir = Directory::with_account(existing_account());

        let outcome = reconciler(&dir, true).reconcile(&pilot()).await.unwrap();

        assert_eq!(outcome, ReconcileOutcome::Existing(existing_account()));
        assert_eq!(dir.accounts.lock().unwrap()[0], existing_account());
    }

    #[tokio::test]
    async fn missing_email_creates_nothing() {
        let dir = Directory::default();
        let identity = RemoteIdentity::new("800123").with_name("Pat", "Pilot");

        let err = reconciler(&dir, true).reconcile(&identity).await.unwrap_err();

        assert!(matches!(err, LoginError::MissingEmail));
        assert_eq!(dir.count(), 0);
        assert!(dir.authenticated.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn creation_disabled_creates_nothing() {
        let dir = Directory::default();

        let err = reconciler(&dir, false).reconcile(&pilot()).await.unwrap_err();

        assert!(matches!(err, LoginError::AccountCreationDisabled));
        assert_eq!(dir.count(), 0);
    }

    #[tokio::test]
    async fn creation_disabled_still_admits_existing_accounts() {
        let dir = Directory::with_account(existing_account());

        let outcome = reconciler(&dir, false).reconcile(&pilot()).await.unwrap();

        assert!(!outcome.is_new());
    }

    #[tokio::test]
    async fn deleted_account_does_not_match() {
        let mut deleted = existing_account();
        deleted.deleted = true;
        let dir = Directory::with_account(deleted);

        let err = reconciler(&dir, false).reconcile(&pilot()).await.unwrap_err();

        assert!(matches!(err, LoginError::AccountCreationDisabled));
    }

    #[tokio::test]
    async fn account_on_other_host_does_not_match() {
        let mut remote = existing_account();
        remote.host = HostId(7);
        let dir = Directory::with_account(remote);

        let outcome = reconciler(&dir, true).reconcile(&pilot()).await.unwrap();

        assert!(outcome.is_new());
        assert_eq!(dir.count(), 2);
    }

    #[tokio::test]
    async fn blocked_account_is_refused() {
        let dir = Directory::with_account(existing_account());
        dir.blocked.lock().unwrap().push("800123".into());

        let err = reconciler(&dir, true).reconcile(&pilot()).await.unwrap_err();

        assert!(matches!(err, LoginError::AccountUnavailable(ref u) if u == "800123"));
    }

    #[tokio::test]
    async fn default_audit_is_a_no_op() {
        let dir = Directory::default();
        let rec = Reconciler::new(dir.clone(), dir.clone(), ReconcilerSettings::default());

        rec.reconcile(&pilot()).await.unwrap();

        assert!(dir.audit.lock().unwrap().is_empty());
    }

    #[test]
    fn email_change_is_rejected() {
        let mut old = existing_account();
        old.email = "a@x.com".into();
        let mut new = old.clone();
        new.email = "b@x.com".into();

        assert!(!allow_profile_update(&old, &new));
    }

    #[test]
    fn other_changes_are_allowed() {
        let mut old = existing_account();
        old.email = "a@x.com".into();
        let mut new = old.clone();
        new.first_name = "changed".into();

        assert!(allow_profile_update(&old, &new));
    }
}
