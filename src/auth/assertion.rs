//! Signed JWT bearer assertions for the token exchange

use super::keys::Credential;
use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// OAuth2 grant type for JWT bearer assertions
pub const GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Current time from the system wall clock, never a simulated one.
///
/// Used for assertion timestamps and the renewal check.
pub fn unfrozen_now() -> DateTime<Utc> {
    Utc::now()
}

/// Claim set of a service assertion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

impl AssertionClaims {
    pub fn new(credential: &Credential, username: &str, issued_at: DateTime<Utc>, lifetime: Duration) -> Self {
        let iat = issued_at.timestamp();
        Self {
            iss: credential.issuer_id.clone(),
            sub: username.to_string(),
            aud: credential.token_endpoint_url.clone(),
            iat,
            exp: iat.saturating_add(i64::try_from(lifetime.as_secs()).unwrap_or(i64::MAX)),
        }
    }

    /// Expiry as a timestamp
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_default()
    }
}

/// Assertion ready to be posted to the token endpoint
#[derive(Debug, Clone)]
pub struct SignedAssertion {
    pub token: String,
    pub claims: AssertionClaims,
}

/// Sign an assertion for `username` with the credential's RSA key (RS256)
pub fn sign_assertion(
    credential: &Credential,
    username: &str,
    lifetime: Duration,
) -> Result<SignedAssertion, jsonwebtoken::errors::Error> {
    let claims = AssertionClaims::new(credential, username, unfrozen_now(), lifetime);
    let key = EncodingKey::from_rsa_pem(credential.signing_key.as_bytes())?;
    let token = encode(&Header::new(Algorithm::RS256), &claims, &key)?;
    Ok(SignedAssertion { token, claims })
}
