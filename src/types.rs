use derive_more::{Display, From, Into};
use serde::{Deserialize, Deserializer, Serialize};

/// VATSIM member identifier (CID).
///
/// Stable and provider-issued. This is the only key used to match a
/// remote identity to a local account; email is never used for matching.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Display, From, Into)]
#[serde(transparent)]
pub struct ExternalId(pub String);

impl ExternalId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ExternalId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// The provider has sent CIDs both as JSON strings and as numbers.
impl<'de> Deserialize<'de> for ExternalId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Text(s) => Ok(Self(s)),
            Raw::Number(n) => Ok(Self(n.to_string())),
        }
    }
}

/// Consumer-defined local user identifier (opaque string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct UserId(pub String);

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Identifier of the host (site) that owns a local account.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into,
)]
#[serde(transparent)]
pub struct HostId(pub u64);

/// Request token pair issued by the provider for one login attempt.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct RequestToken {
    #[serde(rename = "oauth_token")]
    pub token: String,
    #[serde(rename = "oauth_token_secret")]
    pub token_secret: String,
}

impl std::fmt::Debug for RequestToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestToken")
            .field("token", &self.token)
            .field("token_secret", &"<redacted>")
            .finish()
    }
}

/// Member identity released by the provider after a successful verifier exchange.
///
/// Untrusted until the reconciler has checked it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct RemoteIdentity {
    pub external_id: ExternalId,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub country_code: String,
}

impl RemoteIdentity {
    #[must_use]
    pub fn new(external_id: impl Into<ExternalId>) -> Self {
        Self {
            external_id: external_id.into(),
            email: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            country_code: String::new(),
        }
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    #[must_use]
    pub fn with_name(mut self, first: impl Into<String>, last: impl Into<String>) -> Self {
        self.first_name = first.into();
        self.last_name = last.into();
        self
    }

    #[must_use]
    pub fn with_country_code(mut self, code: impl Into<String>) -> Self {
        self.country_code = code.into();
        self
    }
}

/// Local user record, owned by the host application's user storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalAccount {
    pub id: UserId,
    /// Equal to the [`ExternalId`] for accounts created through SSO.
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub country: String,
    pub deleted: bool,
    pub host: HostId,
    /// Authentication method name; `"vatsim"` for SSO accounts.
    pub auth_method: String,
}

impl LocalAccount {
    /// Bare externally authenticated account, as created on first login.
    #[must_use]
    pub fn bare(
        id: impl Into<UserId>,
        username: impl Into<String>,
        host: HostId,
        auth_method: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            email: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            country: String::new(),
            deleted: false,
            host,
            auth_method: auth_method.into(),
        }
    }

    /// Whether the profile has the fields required before the user can go on.
    #[must_use]
    pub fn is_fully_set_up(&self) -> bool {
        !self.email.trim().is_empty()
            && !self.first_name.trim().is_empty()
            && !self.last_name.trim().is_empty()
    }
}

/// Profile fields staged from the remote identity when an account is created.
///
/// Merged into the account once, on the first login only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAccountProfile {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub country: String,
}

impl NewAccountProfile {
    #[must_use]
    pub fn from_identity(identity: &RemoteIdentity) -> Self {
        Self {
            email: identity.email.clone(),
            first_name: identity.first_name.clone(),
            last_name: identity.last_name.clone(),
            country: identity.country_code.clone(),
        }
    }

    pub fn apply_to(&self, account: &mut LocalAccount) {
        account.email.clone_from(&self.email);
        account.first_name.clone_from(&self.first_name);
        account.last_name.clone_from(&self.last_name);
        account.country.clone_from(&self.country);
    }
}
