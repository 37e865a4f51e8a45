//! OAuth 1.0a request signing (RFC 5849 §3.4).

use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use rand::Rng;
use rsa::RsaPrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer};
use sha1::Sha1;
use url::Url;

use crate::error::Error;

type HmacSha1 = Hmac<Sha1>;

/// Generates a random `oauth_nonce`.
///
/// Returns a 43-character URL-safe string (32 random bytes → base64url).
#[must_use]
pub fn generate_nonce() -> String {
    let random_bytes: [u8; 32] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(random_bytes)
}

/// Current `oauth_timestamp` (seconds since the Unix epoch).
#[must_use]
pub fn timestamp() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
        .to_string()
}

/// RFC 3986 percent-encoding: everything but `A-Z a-z 0-9 - . _ ~`.
#[must_use]
pub fn percent_encode(s: &str) -> String {
    urlencoding::encode(s).into_owned()
}

/// Signature base string: `METHOD&url&params`, each part percent-encoded.
///
/// Query parameters already on `url` are folded into the parameter set.
#[must_use]
pub fn base_string(method: &str, url: &Url, params: &[(String, String)]) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (percent_encode(&k), percent_encode(&v)))
        .chain(
            params
                .iter()
                .map(|(k, v)| (percent_encode(k), percent_encode(v))),
        )
        .collect();
    pairs.sort();

    let normalized = pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut base_url = url.clone();
    base_url.set_query(None);
    base_url.set_fragment(None);

    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        percent_encode(base_url.as_str()),
        percent_encode(&normalized)
    )
}

/// Produces `oauth_signature` values for one consumer.
pub enum RequestSigner {
    /// `HMAC-SHA1`, keyed by `consumer_secret&token_secret`.
    Hmac { consumer_secret: String },
    /// `RSA-SHA1` with the consumer's private key.
    Rsa { key: Box<SigningKey<Sha1>> },
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Hmac { .. } => "RequestSigner::Hmac",
            Self::Rsa { .. } => "RequestSigner::Rsa",
        })
    }
}

impl RequestSigner {
    #[must_use]
    pub fn hmac(consumer_secret: impl Into<String>) -> Self {
        Self::Hmac {
            consumer_secret: consumer_secret.into(),
        }
    }

    /// Parse a PKCS#1 or PKCS#8 PEM private key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Signing`] if the PEM is not an RSA private key.
    pub fn rsa_from_pem(pem: &str) -> Result<Self, Error> {
        let key = RsaPrivateKey::from_pkcs1_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
            .map_err(|e| Error::Signing(format!("invalid RSA private key: {e}")))?;
        Ok(Self::Rsa {
            key: Box::new(SigningKey::<Sha1>::new(key)),
        })
    }

    /// Value for `oauth_signature_method`.
    #[must_use]
    pub fn method_name(&self) -> &'static str {
        match self {
            Self::Hmac { .. } => "HMAC-SHA1",
            Self::Rsa { .. } => "RSA-SHA1",
        }
    }

    /// Sign a base string. `token_secret` is empty before a token exists,
    /// and is unused by RSA.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Signing`] if the MAC cannot be keyed.
    pub fn sign(&self, base_string: &str, token_secret: &str) -> Result<String, Error> {
        match self {
            Self::Hmac { consumer_secret } => {
                let key = format!(
                    "{}&{}",
                    percent_encode(consumer_secret),
                    percent_encode(token_secret)
                );
                let mut mac = HmacSha1::new_from_slice(key.as_bytes())
                    .map_err(|e| Error::Signing(e.to_string()))?;
                mac.update(base_string.as_bytes());
                Ok(STANDARD.encode(mac.finalize().into_bytes()))
            }
            Self::Rsa { key } => {
                let signature = key.sign(base_string.as_bytes());
                Ok(STANDARD.encode(signature.to_bytes()))
            }
        }
    }
}

/// Everything needed to sign one request besides its own parameters.
pub struct SigningContext<'a> {
    pub consumer_key: &'a str,
    pub signer: &'a RequestSigner,
    /// `(oauth_token, token_secret)` once a request token exists.
    pub token: Option<(&'a str, &'a str)>,
}

impl SigningContext<'_> {
    /// Full form parameters, `oauth_signature` included, for a request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Signing`] if signing fails.
    pub fn signed_params(
        &self,
        method: &str,
        url: &Url,
        extra: &[(&str, String)],
    ) -> Result<Vec<(String, String)>, Error> {
        self.signed_params_at(method, url, extra, &generate_nonce(), &timestamp())
    }

    fn signed_params_at(
        &self,
        method: &str,
        url: &Url,
        extra: &[(&str, String)],
        nonce: &str,
        timestamp: &str,
    ) -> Result<Vec<(String, String)>, Error> {
        let mut params: Vec<(String, String)> = vec![
            ("oauth_consumer_key".into(), self.consumer_key.to_string()),
            ("oauth_nonce".into(), nonce.to_string()),
            (
                "oauth_signature_method".into(),
                self.signer.method_name().to_string(),
            ),
            ("oauth_timestamp".into(), timestamp.to_string()),
            ("oauth_version".into(), "1.0".into()),
        ];
        if let Some((token, _)) = self.token {
            params.push(("oauth_token".into(), token.to_string()));
        }
        params.extend(extra.iter().map(|(k, v)| ((*k).to_string(), v.clone())));

        let base = base_string(method, url, &params);
        let token_secret = self.token.map_or("", |(_, secret)| secret);
        let signature = self.signer.sign(&base, token_secret)?;
        params.push(("oauth_signature".into(), signature));

        Ok(params)
    }
}
