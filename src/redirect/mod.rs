//! Navigation decisions around sign-in.
//!
//! Two decision points:
//! - entering a protected action ([`RedirectController::enter_protected_action`])
//! - finishing authentication ([`RedirectController::complete_authentication`])

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::Url;
use tracing::{debug, info, warn};

use crate::auth::{AuthSession, LoginOutcome};
use crate::config::GateConfig;
use crate::error::{GateError, Result};
use crate::intent::{BillingPeriod, Intent, IntentStore, ResumeCheckout};

/// Where the client should go next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// Already allowed; run the action in place.
    Proceed,
    /// Navigate to a same-site `target`; when `resume` is set the target page
    /// restarts checkout without another click.
    Redirect {
        target: String,
        resume: Option<ResumeCheckout>,
    },
    /// Remain on the current page, optionally showing `message`.
    Stay { message: Option<String> },
}

impl Navigation {
    fn to(target: impl Into<String>, resume: Option<ResumeCheckout>) -> Self {
        Self::Redirect {
            target: target.into(),
            resume,
        }
    }

    pub fn target(&self) -> Option<&str> {
        match self {
            Self::Redirect { target, .. } => Some(target),
            _ => None,
        }
    }
}

/// Decides navigation around sign-in and owns the pending intent.
pub struct RedirectController {
    session: AuthSession,
    intents: Arc<dyn IntentStore>,
    base_url: Url,
    login_path: String,
    signup_path: String,
    dashboard_path: String,
    intent_ttl: chrono::Duration,
    ready_timeout: Duration,
}

impl RedirectController {
    pub fn new(
        session: AuthSession,
        intents: Arc<dyn IntentStore>,
        config: &GateConfig,
    ) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            GateError::Configuration(format!("invalid base_url {}: {e}", config.base_url))
        })?;
        Ok(Self {
            session,
            intents,
            base_url,
            login_path: config.login_path.clone(),
            signup_path: config.signup_path.clone(),
            dashboard_path: config.dashboard_path.clone(),
            intent_ttl: config.intent_ttl(),
            ready_timeout: config.ready_timeout(),
        })
    }

    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    /// Decision point A: gate an action that needs a signed-in user.
    pub fn enter_protected_action(&self, intent: Intent) -> Result<Navigation> {
        if self.session.is_authenticated() {
            return Ok(Navigation::Proceed);
        }
        Ok(Navigation::to(self.require_login(intent)?, None))
    }

    /// Store `intent` and return the login URL that brings the user back.
    pub fn require_login(&self, mut intent: Intent) -> Result<String> {
        intent.return_url = self
            .same_site_path(&intent.return_url)
            .unwrap_or_else(|| self.dashboard_path.clone());
        self.intents.save(&intent)?;
        info!(
            intent_id = %intent.id,
            kind = %intent.kind,
            return_url = %intent.return_url,
            "Stored intent before sign-in redirect"
        );
        Ok(self.login_url(&intent.return_url))
    }

    /// Same as [`RedirectController::require_login`] but for the signup page.
    pub fn signup_redirect(&self, mut intent: Intent) -> Result<String> {
        intent.return_url = self
            .same_site_path(&intent.return_url)
            .unwrap_or_else(|| self.dashboard_path.clone());
        self.intents.save(&intent)?;
        let mut params = Vec::new();
        if let Some(plan) = intent.plan.as_deref() {
            params.push(("plan", plan));
        }
        params.push(("redirect", intent.return_url.as_str()));
        Ok(self.with_query(&self.signup_path, &params))
    }

    pub fn login_url(&self, return_url: &str) -> String {
        self.with_query(&self.login_path, &[("redirect", return_url)])
    }

    /// Decision point B: where to go once a login attempt finished.
    ///
    /// On success the pending intent is consumed whichever target wins:
    /// intent, then `redirect_param`, then the dashboard. On rejection
    /// nothing is consumed so the user can retry.
    pub fn complete_authentication(
        &self,
        outcome: &LoginOutcome,
        redirect_param: Option<&str>,
    ) -> Navigation {
        match outcome {
            LoginOutcome::Rejected { reason } => Navigation::Stay {
                message: Some(reason.clone()),
            },
            LoginOutcome::Success { .. } => self.resolve_after_login(redirect_param),
        }
    }

    /// Arriving on the login page: bounded wait for the session, then redirect
    /// an already signed-in user. An expired credential gets one silent
    /// refresh first. Timeout counts as signed out.
    pub async fn on_login_page(&self, redirect_param: Option<&str>) -> Navigation {
        if !self.session.wait_ready(self.ready_timeout).await {
            warn!(
                timeout_ms = self.ready_timeout.as_millis() as u64,
                "Session not ready in time; showing default navigation"
            );
            return Navigation::Stay { message: None };
        }
        if self.session.ensure_authenticated().await {
            let outcome = LoginOutcome::Success {
                user: self.session.user(),
            };
            return self.complete_authentication(&outcome, redirect_param);
        }
        Navigation::Stay { message: None }
    }

    /// Log in, then apply decision point B.
    pub async fn login_and_redirect(
        &self,
        email: &str,
        password: &str,
        redirect_param: Option<&str>,
    ) -> Result<Navigation> {
        let outcome = self.session.login(email, password).await?;
        Ok(self.complete_authentication(&outcome, redirect_param))
    }

    /// Sign up, then apply decision point B.
    pub async fn signup_and_redirect(
        &self,
        email: &str,
        password: &str,
        full_name: Option<&str>,
        redirect_param: Option<&str>,
    ) -> Result<Navigation> {
        let outcome = self.session.signup(email, password, full_name).await?;
        Ok(self.complete_authentication(&outcome, redirect_param))
    }

    /// Peek at the pending intent without consuming it.
    pub fn pending_intent(&self) -> Result<Option<Intent>> {
        Ok(self.intents.load()?)
    }

    pub fn discard_intent(&self) -> Result<()> {
        Ok(self.intents.clear()?)
    }

    /// Build a checkout intent from a `?plan=..&billing=..&redirect=..` URL.
    pub fn intent_from_url(&self, url: &str) -> Option<Intent> {
        let params = self.query_params(url);
        let plan = param(&params, &["plan"])?;
        let billing = billing_from(&params);
        let return_url = param(&params, &["redirect"])
            .and_then(|target| self.same_site_path(&target))
            .unwrap_or_else(|| self.dashboard_path.clone());
        Some(Intent::checkout(plan, billing, return_url))
    }

    fn resolve_after_login(&self, redirect_param: Option<&str>) -> Navigation {
        let intent = match self.intents.take() {
            Ok(intent) => intent,
            Err(err) => {
                warn!(error = %err, "Could not read pending intent; ignoring it");
                None
            }
        };
        let intent = intent.filter(|intent| {
            let stale = intent.is_stale(self.intent_ttl, Utc::now());
            if stale {
                debug!(intent_id = %intent.id, "Dropping stale intent");
            }
            !stale
        });

        // Plan context survives even when the intent's own target is refused.
        let mut carried = None;
        if let Some(intent) = intent {
            if let Some(target) = self.post_login_target(&intent.return_url) {
                info!(intent_id = %intent.id, target = %target, "Resuming intent after sign-in");
                let resume = intent.resume().or_else(|| self.resume_from_url(&target));
                return Navigation::to(target, resume);
            }
            debug!(intent_id = %intent.id, "Intent target refused; using fallback target");
            carried = intent.resume();
        }

        if let Some(target) = redirect_param.and_then(|raw| self.post_login_target(raw)) {
            let resume = carried.or_else(|| self.resume_from_url(&target));
            return Navigation::to(target, resume);
        }

        Navigation::to(self.dashboard_path.clone(), carried)
    }

    /// Same-site target that is not the login page itself.
    fn post_login_target(&self, raw: &str) -> Option<String> {
        let target = self.same_site_path(raw)?;
        let path = target.split(['?', '#']).next().unwrap_or_default();
        (path != self.login_path).then_some(target)
    }

    /// Accept relative paths and absolute URLs on our own origin; anything else
    /// is an open-redirect attempt and is dropped.
    pub fn same_site_path(&self, raw: &str) -> Option<String> {
        let raw = raw.trim();
        if raw.is_empty() || raw.contains('\\') || raw.chars().any(char::is_control) {
            return None;
        }
        if raw.starts_with('/') {
            return (!raw.starts_with("//")).then(|| raw.to_string());
        }
        let url = Url::parse(raw).ok()?;
        if url.origin() != self.base_url.origin() {
            return None;
        }
        let mut path = url.path().to_string();
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }
        Some(path)
    }

    fn resume_from_url(&self, target: &str) -> Option<ResumeCheckout> {
        let params = self.query_params(target);
        let plan = param(&params, &["plan"])?;
        Some(ResumeCheckout {
            plan,
            billing_period: billing_from(&params),
        })
    }

    fn query_params(&self, url: &str) -> Vec<(String, String)> {
        self.base_url
            .join(url)
            .map(|url| url.query_pairs().into_owned().collect())
            .unwrap_or_default()
    }

    fn with_query(&self, path: &str, params: &[(&str, &str)]) -> String {
        let mut url = match self.base_url.join(path) {
            Ok(url) => url,
            Err(_) => return path.to_string(),
        };
        url.query_pairs_mut().extend_pairs(params);
        match url.query() {
            Some(query) => format!("{}?{query}", url.path()),
            None => url.path().to_string(),
        }
    }
}

fn param(params: &[(String, String)], names: &[&str]) -> Option<String> {
    params
        .iter()
        .find(|(key, value)| names.contains(&key.as_str()) && !value.trim().is_empty())
        .map(|(_, value)| value.trim().to_string())
}

fn billing_from(params: &[(String, String)]) -> BillingPeriod {
    param(params, &["billing", "billing_period", "billingPeriod", "period"])
        .and_then(|value| BillingPeriod::from_str(&value).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthError, Credential, MemoryTokenStore, UserProfile};
    use crate::api::{AuthBackend, AuthGrant, CheckoutRequest, CheckoutSession, SignupRequest};
    use crate::intent::MemoryIntentStore;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    struct OfflineBackend;

    #[async_trait]
    impl AuthBackend for OfflineBackend {
        async fn login(&self, _: &str, _: &str) -> std::result::Result<AuthGrant, AuthError> {
            Err(AuthError::Network("offline".to_string()))
        }
        async fn register(&self, _: &SignupRequest) -> std::result::Result<AuthGrant, AuthError> {
            Err(AuthError::Network("offline".to_string()))
        }
        async fn refresh(&self, _: &str) -> std::result::Result<AuthGrant, AuthError> {
            Err(AuthError::Network("offline".to_string()))
        }
        async fn logout(&self, _: &Credential) -> std::result::Result<(), AuthError> {
            Ok(())
        }
        async fn fetch_profile(&self, _: &Credential) -> std::result::Result<UserProfile, AuthError> {
            Err(AuthError::Network("offline".to_string()))
        }
        async fn create_checkout_session(
            &self,
            _: &Credential,
            _: &CheckoutRequest,
        ) -> std::result::Result<CheckoutSession, AuthError> {
            Err(AuthError::Network("offline".to_string()))
        }
    }

    fn controller() -> RedirectController {
        let session = AuthSession::new(Arc::new(OfflineBackend), Arc::new(MemoryTokenStore::new()));
        let config = GateConfig::builder()
            .base_url("https://app.example.com")
            .build();
        RedirectController::new(session, Arc::new(MemoryIntentStore::new()), &config).unwrap()
    }

    #[test]
    fn login_url_encodes_redirect() {
        assert_eq!(
            controller().login_url("/pricing.html"),
            "/login.html?redirect=%2Fpricing.html"
        );
    }

    #[test]
    fn same_site_path_rejects_foreign_targets() {
        let controller = controller();
        assert_eq!(
            controller.same_site_path("/pricing.html?plan=pro").as_deref(),
            Some("/pricing.html?plan=pro")
        );
        assert_eq!(
            controller
                .same_site_path("https://app.example.com/account.html")
                .as_deref(),
            Some("/account.html")
        );
        assert_eq!(controller.same_site_path("//evil.example"), None);
        assert_eq!(controller.same_site_path("https://evil.example/x"), None);
        assert_eq!(controller.same_site_path("javascript:alert(1)"), None);
        assert_eq!(controller.same_site_path("/\\evil.example"), None);
    }

    #[test]
    fn signup_redirect_carries_plan_and_target() {
        let controller = controller();
        let url = controller
            .signup_redirect(Intent::checkout(
                "business",
                BillingPeriod::Monthly,
                "/pricing.html",
            ))
            .unwrap();
        assert_eq!(url, "/signup.html?plan=business&redirect=%2Fpricing.html");
        assert!(controller.pending_intent().unwrap().is_some());
    }

    #[test]
    fn intent_from_url_reads_plan_query() {
        let intent = controller()
            .intent_from_url("/signup.html?plan=professional&billing=annual&redirect=%2Fpricing.html")
            .unwrap();
        assert_eq!(intent.plan.as_deref(), Some("professional"));
        assert_eq!(intent.billing_period, Some(BillingPeriod::Yearly));
        assert_eq!(intent.return_url, "/pricing.html");
    }

    #[test]
    fn redirect_param_pointing_at_login_falls_back_to_dashboard() {
        let nav = controller().complete_authentication(
            &LoginOutcome::Success { user: None },
            Some("/login.html?redirect=%2Fx"),
        );
        assert_eq!(nav.target(), Some("/dashboard.html"));
    }

    #[test]
    fn redirect_param_with_plan_resumes_checkout() {
        let nav = controller().complete_authentication(
            &LoginOutcome::Success { user: None },
            Some("/pricing.html?plan=starter&billing=yearly"),
        );
        assert_eq!(
            nav,
            Navigation::Redirect {
                target: "/pricing.html?plan=starter&billing=yearly".to_string(),
                resume: Some(ResumeCheckout {
                    plan: "starter".to_string(),
                    billing_period: BillingPeriod::Yearly,
                }),
            }
        );
    }

    #[test]
    fn refused_intent_target_keeps_its_plan() {
        let controller = controller();
        controller
            .intents
            .save(&Intent::checkout(
                "business",
                BillingPeriod::Yearly,
                "/login.html?redirect=%2Fpricing.html",
            ))
            .unwrap();

        let nav = controller.complete_authentication(
            &LoginOutcome::Success { user: None },
            Some("/pricing.html"),
        );
        assert_eq!(
            nav,
            Navigation::Redirect {
                target: "/pricing.html".to_string(),
                resume: Some(ResumeCheckout {
                    plan: "business".to_string(),
                    billing_period: BillingPeriod::Yearly,
                }),
            }
        );
        assert!(controller.pending_intent().unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn login_page_times_out_when_session_never_initializes() {
        let nav = controller().on_login_page(Some("/pricing.html")).await;
        assert_eq!(nav, Navigation::Stay { message: None });
    }
}
