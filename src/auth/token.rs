use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::AuthError;

/// Access/refresh token pair proving an authenticated session.
///
/// An access token is never empty; use [`Credential::new`] or
/// [`Credential::from_grant`] to build one.
///
/// # Example
/// ```
/// use statement_gate::auth::Credential;
///
/// let credential = Credential::new("access")
///     .unwrap()
///     .with_refresh_token("refresh");
/// assert!(!credential.is_expired());
/// assert!(Credential::new("").is_err());
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub csrf_token: Option<String>,
}

impl Credential {
    pub fn new(access_token: impl Into<String>) -> Result<Self, AuthError> {
        Self::from_grant(access_token.into(), None, None, None)
    }

    /// Build a credential from a login or refresh grant.
    ///
    /// When the grant carries no expiry, the `exp` claim of a JWT access token
    /// is used instead.
    pub fn from_grant(
        access_token: String,
        refresh_token: Option<String>,
        expires_at: Option<DateTime<Utc>>,
        csrf_token: Option<String>,
    ) -> Result<Self, AuthError> {
        if access_token.trim().is_empty() {
            return Err(AuthError::InvalidResponse(
                "access token is empty".to_string(),
            ));
        }
        let expires_at = expires_at.or_else(|| jwt_expiry(&access_token));
        Ok(Self {
            access_token,
            refresh_token: refresh_token.filter(|t| !t.is_empty()),
            expires_at,
            csrf_token: csrf_token.filter(|t| !t.is_empty()),
        })
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        let refresh_token = refresh_token.into();
        self.refresh_token = (!refresh_token.is_empty()).then_some(refresh_token);
        self
    }

    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn with_csrf_token(mut self, csrf_token: impl Into<String>) -> Self {
        self.csrf_token = Some(csrf_token.into());
        self
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"..")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| ".."))
            .field("expires_at", &self.expires_at)
            .field("csrf_token", &self.csrf_token.as_ref().map(|_| ".."))
            .finish()
    }
}

#[derive(Deserialize)]
struct JwtClaims {
    exp: Option<i64>,
}

/// Expiry from the `exp` claim of a JWT, if the token is one.
pub fn jwt_expiry(token: &str) -> Option<DateTime<Utc>> {
    let mut parts = token.split('.');
    let (_header, payload, _signature) = (parts.next()?, parts.next()?, parts.next()?);
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: JwtClaims = serde_json::from_slice(&bytes).ok()?;
    DateTime::<Utc>::from_timestamp(claims.exp?, 0)
}
