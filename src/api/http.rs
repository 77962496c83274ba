//! reqwest implementation of [`AuthBackend`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::{
    AuthBackend, AuthGrant, CheckoutRequest, CheckoutSession, CredentialTransport, SignupRequest,
};
use crate::auth::{AuthError, Credential, UserProfile};
use crate::config::GateConfig;
use crate::error::GateError;

pub const LOGIN_PATH: &str = "/api/auth/login";
pub const REGISTER_PATH: &str = "/api/auth/register";
pub const REFRESH_PATH: &str = "/api/auth/refresh";
pub const LOGOUT_PATH: &str = "/api/auth/logout";
pub const PROFILE_PATH: &str = "/api/auth/me";
pub const CHECKOUT_PATH: &str = "/api/stripe/create-checkout-session";

const CSRF_HEADER: &str = "x-csrf-token";

/// HTTP backend for the statement converter API.
///
/// Every authenticated request goes through [`HttpBackend::authorize`], the
/// one place the credential transport is applied.
///
/// # Example
/// ```no_run
/// use statement_gate::api::{CredentialTransport, HttpBackend};
///
/// let backend = HttpBackend::new("https://app.example.com", CredentialTransport::Bearer)?;
/// # Ok::<(), statement_gate::auth::AuthError>(())
/// ```
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: Url,
    transport: CredentialTransport,
}

impl HttpBackend {
    pub fn new(base_url: &str, transport: CredentialTransport) -> Result<Self, AuthError> {
        Self::with_timeout(base_url, transport, Duration::from_secs(30))
    }

    pub fn with_timeout(
        base_url: &str,
        transport: CredentialTransport,
        timeout: Duration,
    ) -> Result<Self, AuthError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| AuthError::InvalidResponse(format!("invalid base url {base_url}: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .cookie_store(transport.uses_cookie())
            .build()?;
        Ok(Self {
            client,
            base_url,
            transport,
        })
    }

    pub fn from_config(config: &GateConfig) -> Result<Self, GateError> {
        Self::with_timeout(&config.base_url, config.transport, config.request_timeout())
            .map_err(|e| GateError::Configuration(e.to_string()))
    }

    pub fn transport(&self) -> CredentialTransport {
        self.transport
    }

    fn endpoint(&self, path: &str) -> Result<Url, AuthError> {
        self.base_url
            .join(path)
            .map_err(|e| AuthError::InvalidResponse(format!("invalid endpoint {path}: {e}")))
    }

    fn post_json<T: Serialize + ?Sized>(&self, url: Url, body: &T) -> RequestBuilder {
        self.client
            .post(url)
            .header(ACCEPT, "application/json")
            .json(body)
    }

    /// Attach the credential using the configured transport.
    pub fn authorize(&self, builder: RequestBuilder, credential: &Credential) -> RequestBuilder {
        let mut headers = HeaderMap::new();
        if self.transport.uses_bearer() {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", credential.access_token))
            {
                headers.insert(AUTHORIZATION, value);
            }
        }
        if self.transport.uses_cookie() {
            if let Some(value) = credential
                .csrf_token
                .as_deref()
                .and_then(|token| HeaderValue::from_str(token).ok())
            {
                headers.insert(CSRF_HEADER, value);
            }
        }
        builder.headers(headers)
    }

    async fn grant_from(&self, resp: Response) -> Result<AuthGrant, AuthError> {
        let header_csrf = resp
            .headers()
            .get(CSRF_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let mut grant: AuthGrant = read_json(resp, Failure::Credentials).await?;
        if grant.csrf_token.is_none() {
            grant.csrf_token = header_csrf;
        }
        Ok(grant)
    }
}

#[async_trait]
impl AuthBackend for HttpBackend {
    async fn login(&self, email: &str, password: &str) -> Result<AuthGrant, AuthError> {
        let body = serde_json::json!({ "email": email, "password": password });
        let resp = self
            .post_json(self.endpoint(LOGIN_PATH)?, &body)
            .send()
            .await?;
        debug!(status = %resp.status(), "Login response");
        self.grant_from(resp).await
    }

    async fn register(&self, request: &SignupRequest) -> Result<AuthGrant, AuthError> {
        let resp = self
            .post_json(self.endpoint(REGISTER_PATH)?, request)
            .send()
            .await?;
        debug!(status = %resp.status(), "Register response");
        self.grant_from(resp).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthGrant, AuthError> {
        let body = serde_json::json!({ "refreshToken": refresh_token });
        let resp = self
            .post_json(self.endpoint(REFRESH_PATH)?, &body)
            .send()
            .await?;
        debug!(status = %resp.status(), "Refresh response");
        read_json(resp, Failure::Authorized).await
    }

    async fn logout(&self, credential: &Credential) -> Result<(), AuthError> {
        let builder = self
            .client
            .post(self.endpoint(LOGOUT_PATH)?)
            .header(ACCEPT, "application/json");
        let resp = self.authorize(builder, credential).send().await?;
        if resp.status().is_success() {
            return Ok(());
        }
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        Err(status_to_error(status, &body, Failure::Authorized))
    }

    async fn fetch_profile(&self, credential: &Credential) -> Result<UserProfile, AuthError> {
        let builder = self
            .client
            .get(self.endpoint(PROFILE_PATH)?)
            .header(ACCEPT, "application/json");
        let resp = self.authorize(builder, credential).send().await?;
        let value: serde_json::Value = read_json(resp, Failure::Authorized).await?;
        // Some deployments wrap the profile as `{ "user": {...} }`.
        let profile = if value.get("user").is_some_and(|user| user.is_object()) {
            value["user"].clone()
        } else {
            value
        };
        serde_json::from_value(profile).map_err(|e| AuthError::InvalidResponse(e.to_string()))
    }

    async fn create_checkout_session(
        &self,
        credential: &Credential,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, AuthError> {
        let builder = self.post_json(self.endpoint(CHECKOUT_PATH)?, request);
        let resp = self.authorize(builder, credential).send().await?;
        debug!(status = %resp.status(), plan = %request.plan, "Checkout session response");
        let session: CheckoutSession = read_json(resp, Failure::Authorized).await?;
        if session.checkout_url.trim().is_empty() {
            return Err(AuthError::InvalidResponse(
                "checkout session has no url".to_string(),
            ));
        }
        Ok(session)
    }
}

/// How a non-2xx status should be classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Failure {
    /// Login/signup: 4xx means the submitted credentials were refused.
    Credentials,
    /// Authorized calls: 401/403 means the credential is no longer valid.
    Authorized,
}

async fn read_json<T: DeserializeOwned>(resp: Response, failure: Failure) -> Result<T, AuthError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(status_to_error(status, &body, failure));
    }
    resp.json::<T>()
        .await
        .map_err(|e| AuthError::InvalidResponse(e.to_string()))
}

fn status_to_error(status: StatusCode, body: &str, failure: Failure) -> AuthError {
    let code = status.as_u16();
    match (failure, code) {
        (Failure::Credentials, 400 | 401 | 403 | 409 | 422) => AuthError::Rejected {
            status: code,
            reason: extract_error_message(body)
                .unwrap_or_else(|| "Invalid email or password".to_string()),
        },
        (Failure::Authorized, 401 | 403) => AuthError::Unauthorized { status: code },
        _ => AuthError::Api {
            status: code,
            message: extract_error_message(body).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Unexpected response")
                    .to_string()
            }),
        },
    }
}

/// Pull a human-readable message out of `{error}`, `{detail}` or `{message}`.
fn extract_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["error", "detail", "message"]
        .iter()
        .find_map(|key| match value.get(key)? {
            serde_json::Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
            serde_json::Value::Object(inner) => inner
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string),
            _ => None,
        })
}
