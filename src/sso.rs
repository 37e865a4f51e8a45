use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::Error;
use crate::handshake::SignedRequestClient;
use crate::signing::{RequestSigner, SigningContext};
use crate::types::{ExternalId, RemoteIdentity, RequestToken};

/// How requests to the provider are signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SigningMethod {
    #[default]
    Hmac,
    Rsa,
}

impl std::str::FromStr for SigningMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HMAC" | "HMAC-SHA1" => Ok(Self::Hmac),
            "RSA" | "RSA-SHA1" => Ok(Self::Rsa),
            other => Err(Error::Config(format!(
                "unknown signing method {other:?} (expected HMAC or RSA)"
            ))),
        }
    }
}

/// VATSIM SSO consumer configuration.
///
/// Required fields are constructor parameters. Built once and never
/// mutated by the handshake.
///
/// ```rust,ignore
/// use vatsim_sso::ProviderConfig;
///
/// let config = ProviderConfig::new(
///     "https://cert.vatsim.net/sso/".parse()?,
///     "SSO_DEMO",
///     "consumer-secret",
///     "https://my-site.example/auth/vatsim/login".parse()?,
/// )
/// .with_rsa_key(std::fs::read_to_string("sso.pem")?);
/// ```
#[derive(Clone)]
#[non_exhaustive]
pub struct ProviderConfig {
    pub(crate) base_url: Url,
    pub(crate) consumer_key: String,
    pub(crate) consumer_secret: String,
    pub(crate) signing_method: SigningMethod,
    pub(crate) certificate: Option<String>,
    pub(crate) return_url: Url,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("base_url", &self.base_url.as_str())
            .field("consumer_key", &self.consumer_key)
            .field("signing_method", &self.signing_method)
            .field("return_url", &self.return_url.as_str())
            .finish_non_exhaustive()
    }
}

impl ProviderConfig {
    /// HMAC-signed configuration. The base URL always ends in `/`.
    #[must_use]
    pub fn new(
        mut base_url: Url,
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
        return_url: Url,
    ) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            base_url,
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            signing_method: SigningMethod::Hmac,
            certificate: None,
            return_url,
        }
    }

    #[must_use]
    pub fn with_signing_method(mut self, method: SigningMethod) -> Self {
        self.signing_method = method;
        self
    }

    /// Set the RSA private key (PEM). Only used with [`SigningMethod::Rsa`].
    #[must_use]
    pub fn with_certificate(mut self, pem: impl Into<String>) -> Self {
        self.certificate = Some(pem.into());
        self
    }

    /// Switch to RSA signing with this private key.
    #[must_use]
    pub fn with_rsa_key(self, pem: impl Into<String>) -> Self {
        self.with_signing_method(SigningMethod::Rsa)
            .with_certificate(pem)
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub fn consumer_key(&self) -> &str {
        &self.consumer_key
    }

    #[must_use]
    pub fn signing_method(&self) -> SigningMethod {
        self.signing_method
    }

    #[must_use]
    pub fn return_url(&self) -> &Url {
        &self.return_url
    }

    /// Check the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the consumer key is empty, the base URL
    /// cannot have paths joined to it, or RSA is selected without a key.
    pub fn validate(&self) -> Result<(), Error> {
        if self.consumer_key.trim().is_empty() {
            return Err(Error::Config("consumer key is empty".into()));
        }
        if self.base_url.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "base URL {} cannot be used as a base",
                self.base_url
            )));
        }
        if self.signing_method == SigningMethod::Rsa
            && self.certificate.as_deref().is_none_or(|c| c.trim().is_empty())
        {
            return Err(Error::Config(
                "RSA signing requires a private key certificate".into(),
            ));
        }
        Ok(())
    }

    fn signer(&self) -> Result<RequestSigner, Error> {
        match (self.signing_method, self.certificate.as_deref()) {
            (SigningMethod::Hmac, _) => Ok(RequestSigner::hmac(self.consumer_secret.clone())),
            (SigningMethod::Rsa, Some(pem)) => RequestSigner::rsa_from_pem(pem),
            (SigningMethod::Rsa, None) => Err(Error::Config(
                "RSA signing requires a private key certificate".into(),
            )),
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, Error> {
        self.base_url
            .join(path)
            .map_err(|e| Error::Config(format!("{path}: {e}")))
    }
}

/// VATSIM SSO client: signs requests and parses provider responses.
pub struct SsoClient {
    config: ProviderConfig,
    signer: RequestSigner,
    http: reqwest::Client,
    login_token_url: Url,
    login_return_url: Url,
    pre_login_url: Url,
}

#[derive(Deserialize)]
struct RequestStatus {
    result: String,
    #[serde(default)]
    message: Option<String>,
}

impl RequestStatus {
    fn ensure_success(&self, operation: &'static str) -> Result<(), Error> {
        if self.result.eq_ignore_ascii_case("success") {
            return Ok(());
        }
        Err(Error::Provider {
            operation,
            status: None,
            detail: self.message.clone().unwrap_or_else(|| self.result.clone()),
        })
    }
}

#[derive(Deserialize)]
struct TokenEnvelope {
    request: RequestStatus,
    #[serde(default)]
    token: Option<RequestToken>,
}

#[derive(Deserialize)]
struct UserEnvelope {
    request: RequestStatus,
    #[serde(default)]
    user: Option<ProviderUser>,
}

#[derive(Deserialize)]
struct ProviderUser {
    id: ExternalId,
    #[serde(default)]
    name_first: Option<String>,
    #[serde(default)]
    name_last: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    country: Option<ProviderCountry>,
}

#[derive(Deserialize)]
struct ProviderCountry {
    #[serde(default)]
    code: Option<String>,
}

impl From<ProviderUser> for RemoteIdentity {
    fn from(user: ProviderUser) -> Self {
        Self::new(user.id)
            .with_email(user.email.unwrap_or_default())
            .with_name(
                user.name_first.unwrap_or_default(),
                user.name_last.unwrap_or_default(),
            )
            .with_country_code(user.country.and_then(|c| c.code).unwrap_or_default())
    }
}

impl SsoClient {
    /// Create a client for `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the config is invalid, or
    /// [`Error::Signing`] if the RSA key cannot be parsed.
    pub fn new(config: ProviderConfig) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            signer: config.signer()?,
            login_token_url: config.endpoint("api/login_token/")?,
            login_return_url: config.endpoint("api/login_return/")?,
            pre_login_url: config.endpoint("auth/pre_login/")?,
            http: reqwest::Client::new(),
            config,
        })
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    async fn post_signed<T: DeserializeOwned>(
        &self,
        url: &Url,
        token: Option<&RequestToken>,
        extra: &[(&str, String)],
        operation: &'static str,
    ) -> Result<T, Error> {
        let ctx = SigningContext {
            consumer_key: &self.config.consumer_key,
            signer: &self.signer,
            token: token.map(|t| (t.token.as_str(), t.token_secret.as_str())),
        };
        let params = ctx.signed_params("POST", url, extra)?;

        let response = self.http.post(url.clone()).form(&params).send().await?;
        let response = Self::ensure_success(response, operation).await?;
        response.json::<T>().await.map_err(Into::into)
    }

    /// Checks HTTP response status; returns the response on success or an error with details.
    async fn ensure_success(
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<reqwest::Response, Error> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(Error::Provider {
            operation,
            status: Some(status),
            detail: body,
        })
    }
}

impl SignedRequestClient for SsoClient {
    async fn request_token(
        &self,
        return_url: &Url,
        allow_suspended: bool,
        allow_inactive: bool,
    ) -> Result<RequestToken, Error> {
        let extra = [
            ("oauth_callback", return_url.to_string()),
            ("oauth_allow_suspended", allow_suspended.to_string()),
            ("oauth_allow_inactive", allow_inactive.to_string()),
        ];
        let envelope: TokenEnvelope = self
            .post_signed(&self.login_token_url, None, &extra, "login token")
            .await?;
        envelope.request.ensure_success("login token")?;

        envelope
            .token
            .filter(|t| !t.token.is_empty() && !t.token_secret.is_empty())
            .ok_or_else(|| Error::Provider {
                operation: "login token",
                status: None,
                detail: "response contained no token".into(),
            })
    }

    fn authorization_url(&self, token: &RequestToken) -> Url {
        let mut url = self.pre_login_url.clone();
        url.query_pairs_mut().append_pair("oauth_token", &token.token);
        url
    }

    async fn exchange_verifier(
        &self,
        token: &RequestToken,
        verifier: &str,
    ) -> Result<RemoteIdentity, Error> {
        let extra = [("oauth_verifier", verifier.to_string())];
        let envelope: UserEnvelope = self
            .post_signed(&self.login_return_url, Some(token), &extra, "login return")
            .await?;
        envelope.request.ensure_success("login return")?;

        envelope
            .user
            .map(RemoteIdentity::from)
            .ok_or_else(|| Error::Provider {
                operation: "login return",
                status: None,
                detail: "response contained no user".into(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ProviderConfig {
        ProviderConfig::new(
            "https://sso.example/sso".parse().unwrap(),
            "SSO_DEMO",
            "secret",
            "https://lms.example/auth/vatsim/login".parse().unwrap(),
        )
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        assert_eq!(test_config().base_url().as_str(), "https://sso.example/sso/");
    }

    #[test]
    fn test_endpoints_join_under_base() {
        let client = SsoClient::new(test_config()).unwrap();
        assert_eq!(
            client.login_token_url.as_str(),
            "https://sso.example/sso/api/login_token/"
        );
        assert_eq!(
            client.login_return_url.as_str(),
            "https://sso.example/sso/api/login_return/"
        );
    }

    #[test]
    fn test_authorization_url_carries_token() {
        let client = SsoClient::new(test_config()).unwrap();
        let url = client.authorization_url(&RequestToken {
            token: "tok 1".into(),
            token_secret: "sec1".into(),
        });
        assert_eq!(
            url.as_str(),
            "https://sso.example/sso/auth/pre_login/?oauth_token=tok+1"
        );
        assert!(!url.as_str().contains("sec1"));
    }

    #[test]
    fn test_rsa_without_certificate_is_rejected() {
        let config = test_config().with_signing_method(SigningMethod::Rsa);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
        assert!(SsoClient::new(config).is_err());
    }

    #[test]
    fn test_rsa_with_bad_key_is_rejected() {
        let config = test_config().with_rsa_key("-----BEGIN NONSENSE-----");
        assert!(matches!(SsoClient::new(config), Err(Error::Signing(_))));
    }

    #[test]
    fn test_hmac_ignores_certificate() {
        let config = test_config().with_certificate("unused");
        assert!(SsoClient::new(config).is_ok());
    }

    #[test]
    fn test_empty_consumer_key_is_rejected() {
        let config = ProviderConfig::new(
            "https://sso.example/".parse().unwrap(),
            "",
            "secret",
            "https://lms.example/".parse().unwrap(),
        );
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let rendered = format!("{:?}", test_config().with_rsa_key("PRIVATE"));
        assert!(!rendered.contains("secret"));
        assert!(!rendered.contains("PRIVATE"));
    }

    #[test]
    fn test_signing_method_parsing() {
        assert_eq!("hmac".parse::<SigningMethod>().unwrap(), SigningMethod::Hmac);
        assert_eq!("RSA".parse::<SigningMethod>().unwrap(), SigningMethod::Rsa);
        assert!("PLAINTEXT".parse::<SigningMethod>().is_err());
    }

    #[test]
    fn test_provider_user_maps_to_identity() {
        let json = r#"{"id":800123,"name_first":"Pat","name_last":"Pilot",
            "email":"p@vatsim.example","country":{"code":"GB","name":"United Kingdom"}}"#;
        let user: ProviderUser = serde_json::from_str(json).unwrap();
        let identity = RemoteIdentity::from(user);

        assert_eq!(identity.external_id.as_str(), "800123");
        assert_eq!(identity.first_name, "Pat");
        assert_eq!(identity.country_code, "GB");
    }

    #[test]
    fn test_provider_user_null_email_is_empty() {
        let user: ProviderUser = serde_json::from_str(r#"{"id":"800123","email":null}"#).unwrap();
        assert!(RemoteIdentity::from(user).email.is_empty());
    }
}
