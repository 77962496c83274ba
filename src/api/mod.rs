//! Backend contract consumed by the session and checkout layers.

pub mod http;

pub use http::HttpBackend;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::auth::{AuthError, Credential, UserProfile};
use crate::intent::BillingPeriod;

/// How the credential travels with authenticated requests.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CredentialTransport {
    /// `Authorization: Bearer <access token>`.
    #[default]
    Bearer,
    /// Session cookie kept by the client plus an `X-CSRF-Token` header.
    Cookie,
    Both,
}

impl CredentialTransport {
    pub fn uses_bearer(self) -> bool {
        matches!(self, Self::Bearer | Self::Both)
    }

    pub fn uses_cookie(self) -> bool {
        matches!(self, Self::Cookie | Self::Both)
    }
}

/// Tokens (and optionally the user) returned by login, signup and refresh.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthGrant {
    #[serde(alias = "accessToken")]
    pub access_token: String,
    #[serde(default, alias = "refreshToken")]
    pub refresh_token: Option<String>,
    #[serde(default, alias = "expiresAt")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "csrfToken")]
    pub csrf_token: Option<String>,
    #[serde(default)]
    pub user: Option<UserProfile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    #[serde(rename = "fullName", skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutRequest {
    pub plan: String,
    #[serde(rename = "billingPeriod")]
    pub billing_period: BillingPeriod,
}

/// Backend-issued redirect target for external payment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckoutSession {
    #[serde(alias = "checkoutUrl", alias = "url")]
    pub checkout_url: String,
}

/// Network operations behind the session, redirect and checkout flows.
///
/// Expected failures map onto [`AuthError`]:
/// - bad credentials on login/signup: [`AuthError::Rejected`]
/// - 401/403 on authorized calls: [`AuthError::Unauthorized`]
/// - other non-2xx: [`AuthError::Api`]
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Result<AuthGrant, AuthError>;

    async fn register(&self, request: &SignupRequest) -> Result<AuthGrant, AuthError>;

    async fn refresh(&self, refresh_token: &str) -> Result<AuthGrant, AuthError>;

    /// Best-effort server-side logout.
    async fn logout(&self, credential: &Credential) -> Result<(), AuthError>;

    async fn fetch_profile(&self, credential: &Credential) -> Result<UserProfile, AuthError>;

    async fn create_checkout_session(
        &self,
        credential: &Credential,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, AuthError>;
}
