use axum_extra::extract::cookie::Key;
use url::Url;

use super::error::AuthError;
use crate::reconcile::ReconcilerSettings;
use crate::sso::{ProviderConfig, SigningMethod, SsoClient};
use crate::types::HostId;

/// Shared auth settings used by both config and runtime state.
#[derive(Clone)]
pub(crate) struct AuthSettings {
    pub(crate) cookie_key: Key,
    pub(crate) session_cookie_name: String,
    pub(crate) session_ttl_days: i64,
    pub(crate) secure_cookies: bool,
    pub(crate) auth_path: String,
    pub(crate) login_redirect: String,
    pub(crate) profile_path: String,
    pub(crate) error_redirect: String,
    pub(crate) site_url: Option<Url>,
}

impl AuthSettings {
    pub(crate) fn defaults() -> Self {
        Self {
            cookie_key: Key::generate(),
            session_cookie_name: "__vatsim_session".into(),
            session_ttl_days: 30,
            secure_cookies: true,
            auth_path: "/auth/vatsim".into(),
            login_redirect: "/".into(),
            profile_path: "/user/edit".into(),
            error_redirect: "/login".into(),
            site_url: None,
        }
    }
}

/// VATSIM SSO configuration for the Axum routes.
///
/// Required field (`client`) is a constructor parameter.
///
/// Use [`from_env()`](SsoAuthConfig::from_env) for convention-based setup,
/// or [`new()`](SsoAuthConfig::new) with `with_*` methods for full control.
pub struct SsoAuthConfig {
    pub(super) client: SsoClient,
    pub(super) reconciler: ReconcilerSettings,
    pub(super) settings: AuthSettings,
}

impl SsoAuthConfig {
    /// Create config with the required `SsoClient`.
    ///
    /// Account creation is allowed by default.
    #[must_use]
    pub fn new(client: SsoClient) -> Self {
        Self {
            client,
            reconciler: ReconcilerSettings::default(),
            settings: AuthSettings::defaults(),
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `VATSIM_SSO_BASE`: SSO base URL, e.g. `https://cert.vatsim.net/sso/`
    /// - `VATSIM_SSO_KEY`: consumer key
    /// - `VATSIM_SSO_SECRET`: consumer secret
    /// - `VATSIM_SSO_RETURN`: return URL (this site's login hook)
    ///
    /// # Optional env vars
    /// - `VATSIM_SSO_METHOD`: `HMAC` (default) or `RSA`
    /// - `VATSIM_SSO_CERT`: RSA private key PEM, required when method is `RSA`.
    ///   Literal `\n` sequences are turned into newlines.
    /// - `SSO_ALLOW_ACCOUNT_CREATION`: `"0"`/`"false"` to refuse new accounts
    /// - `SSO_LOCAL_HOST_ID`: host id of local accounts (default 1)
    /// - `SSO_SITE_URL`: site root; absolute post-login targets must start with it
    /// - `SSO_INSECURE_COOKIES`: `"1"`/`"true"` to drop the `Secure` cookie flag (local dev)
    /// - `COOKIE_KEY`: Cookie encryption key bytes
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if required env vars are missing or values are invalid.
    pub fn from_env() -> Result<Self, AuthError> {
        let base = required_url("VATSIM_SSO_BASE")?;
        let key = required("VATSIM_SSO_KEY")?;
        let secret = required("VATSIM_SSO_SECRET")?;
        let return_url = required_url("VATSIM_SSO_RETURN")?;

        let mut provider = ProviderConfig::new(base, key, secret, return_url);

        if let Ok(method) = std::env::var("VATSIM_SSO_METHOD") {
            let method: SigningMethod = method
                .parse()
                .map_err(|e| AuthError::Config(format!("VATSIM_SSO_METHOD: {e}")))?;
            provider = provider.with_signing_method(method);
        }
        if let Ok(cert) = std::env::var("VATSIM_SSO_CERT") {
            provider = provider.with_certificate(cert.replace("\\n", "\n"));
        }

        let client = SsoClient::new(provider)?;

        let allow_account_creation = !matches!(
            std::env::var("SSO_ALLOW_ACCOUNT_CREATION").as_deref(),
            Ok("0") | Ok("false"),
        );

        let local_host = match std::env::var("SSO_LOCAL_HOST_ID") {
            Ok(id) => HostId(
                id.parse()
                    .map_err(|e| AuthError::Config(format!("SSO_LOCAL_HOST_ID: {e}")))?,
            ),
            Err(_) => HostId(1),
        };

        let insecure = matches!(
            std::env::var("SSO_INSECURE_COOKIES").as_deref(),
            Ok("1") | Ok("true"),
        );

        let cookie_key = match std::env::var("COOKIE_KEY") {
            Ok(k) => Key::try_from(k.as_bytes()).map_err(|_| {
                AuthError::Config(
                    "COOKIE_KEY is set but invalid (must be at least 64 bytes). \
                     Remove the env var to use an ephemeral key, or provide a valid key."
                        .into(),
                )
            })?,
            Err(_) => Key::generate(),
        };

        let mut config = Self::new(client)
            .with_cookie_key(cookie_key)
            .with_secure_cookies(!insecure)
            .with_allow_account_creation(allow_account_creation)
            .with_local_host(local_host);

        if let Ok(site) = std::env::var("SSO_SITE_URL") {
            let site: Url = site
                .parse()
                .map_err(|e| AuthError::Config(format!("SSO_SITE_URL: {e}")))?;
            config = config.with_site_url(site);
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_allow_account_creation(mut self, allow: bool) -> Self {
        self.reconciler.allow_account_creation = allow;
        self
    }

    #[must_use]
    pub fn with_local_host(mut self, host: HostId) -> Self {
        self.reconciler.local_host = host;
        self
    }

    #[must_use]
    pub fn with_cookie_key(mut self, key: Key) -> Self {
        self.settings.cookie_key = key;
        self
    }

    #[must_use]
    pub fn with_session_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.settings.session_cookie_name = name.into();
        self
    }

    #[must_use]
    pub fn with_session_ttl_days(mut self, days: i64) -> Self {
        self.settings.session_ttl_days = days;
        self
    }

    #[must_use]
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.settings.secure_cookies = secure;
        self
    }

    #[must_use]
    pub fn with_auth_path(mut self, path: impl Into<String>) -> Self {
        self.settings.auth_path = path.into();
        self
    }

    #[must_use]
    pub fn with_login_redirect(mut self, path: impl Into<String>) -> Self {
        self.settings.login_redirect = path.into();
        self
    }

    /// Where users with an incomplete profile are sent after login.
    #[must_use]
    pub fn with_profile_path(mut self, path: impl Into<String>) -> Self {
        self.settings.profile_path = path.into();
        self
    }

    #[must_use]
    pub fn with_error_redirect(mut self, path: impl Into<String>) -> Self {
        self.settings.error_redirect = path.into();
        self
    }

    #[must_use]
    pub fn with_site_url(mut self, url: Url) -> Self {
        self.settings.site_url = Some(url);
        self
    }
}

fn required(name: &str) -> Result<String, AuthError> {
    std::env::var(name).map_err(|_| AuthError::Config(format!("{name} is required")))
}

fn required_url(name: &str) -> Result<Url, AuthError> {
    required(name)?
        .parse()
        .map_err(|e| AuthError::Config(format!("{name}: {e}")))
}
