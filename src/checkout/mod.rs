//! Checkout initiation gated by the signed-in session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use crate::api::{AuthBackend, CheckoutRequest, CheckoutSession};
use crate::auth::{AuthError, AuthSession};
use crate::config::GateConfig;
use crate::error::{GateError, Result};
use crate::intent::{BillingPeriod, Intent, ResumeCheckout};
use crate::redirect::RedirectController;

/// The control (button) that started checkout.
///
/// Disabled while the request is out so it cannot be submitted twice.
pub trait SubmitControl: Send + Sync {
    fn set_enabled(&self, enabled: bool);
}

/// For callers with no control to toggle.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoControl;

impl SubmitControl for NoControl {
    fn set_enabled(&self, _enabled: bool) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutOutcome {
    /// Leave the site for the payment page.
    Redirect { checkout_url: String },
    /// Sign-in needed first; the intent has been stored.
    LoginRequired { login_url: String },
    /// A checkout for this initiator is already in flight.
    AlreadyInFlight,
    /// Backend refused or failed; `message` is user-facing.
    Failed { message: String },
}

/// Re-enables the control and clears the in-flight flag on drop.
struct ControlGuard<'a> {
    control: &'a dyn SubmitControl,
    in_flight: &'a AtomicBool,
    restore: bool,
}

impl<'a> ControlGuard<'a> {
    fn acquire(control: &'a dyn SubmitControl, in_flight: &'a AtomicBool) -> Option<Self> {
        if in_flight.swap(true, Ordering::AcqRel) {
            return None;
        }
        control.set_enabled(false);
        Some(Self {
            control,
            in_flight,
            restore: true,
        })
    }

    /// Leave the control disabled: the page is navigating away.
    fn navigating_away(&mut self) {
        self.restore = false;
    }
}

impl Drop for ControlGuard<'_> {
    fn drop(&mut self) {
        if self.restore {
            self.control.set_enabled(true);
        }
        self.in_flight.store(false, Ordering::Release);
    }
}

enum Attempt {
    Created(CheckoutSession),
    NeedsLogin,
    Failed(AuthError),
}

pub struct CheckoutInitiator {
    session: AuthSession,
    backend: Arc<dyn AuthBackend>,
    redirect: Arc<RedirectController>,
    plans: Vec<String>,
    in_flight: AtomicBool,
}

impl CheckoutInitiator {
    pub fn new(
        session: AuthSession,
        backend: Arc<dyn AuthBackend>,
        redirect: Arc<RedirectController>,
        config: &GateConfig,
    ) -> Self {
        Self {
            session,
            backend,
            redirect,
            plans: config.plans.clone(),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Start checkout for `plan`, or route through sign-in first.
    ///
    /// A 401/403 gets exactly one refresh and one retry; if either fails the
    /// user is sent to sign in with the intent stored. Other failures come
    /// back as [`CheckoutOutcome::Failed`] without a retry.
    pub async fn start_checkout(
        &self,
        plan: &str,
        billing_period: BillingPeriod,
        current_url: &str,
        control: &dyn SubmitControl,
    ) -> Result<CheckoutOutcome> {
        let plan = self.known_plan(plan)?;
        let intent = Intent::checkout(plan.clone(), billing_period, current_url);

        if !self.session.ensure_authenticated().await {
            let login_url = self.redirect.require_login(intent)?;
            return Ok(CheckoutOutcome::LoginRequired { login_url });
        }

        let Some(mut guard) = ControlGuard::acquire(control, &self.in_flight) else {
            return Ok(CheckoutOutcome::AlreadyInFlight);
        };

        let request = CheckoutRequest {
            plan,
            billing_period,
        };
        match self.create_with_refresh(&request).await {
            Attempt::Created(session) => {
                guard.navigating_away();
                info!(plan = %request.plan, billing = %request.billing_period, "Checkout session created");
                Ok(CheckoutOutcome::Redirect {
                    checkout_url: session.checkout_url,
                })
            }
            Attempt::NeedsLogin => {
                drop(guard);
                // The credential is dead; keep the login page from bouncing back.
                self.session.discard_local();
                let login_url = self.redirect.require_login(intent)?;
                Ok(CheckoutOutcome::LoginRequired { login_url })
            }
            Attempt::Failed(err) => {
                drop(guard);
                let err = GateError::from(err);
                warn!(error = %err, plan = %request.plan, "Checkout session failed");
                Ok(CheckoutOutcome::Failed {
                    message: err.user_message(),
                })
            }
        }
    }

    /// Resume a checkout carried over from sign-in.
    pub async fn resume(
        &self,
        resume: &ResumeCheckout,
        current_url: &str,
        control: &dyn SubmitControl,
    ) -> Result<CheckoutOutcome> {
        self.start_checkout(&resume.plan, resume.billing_period, current_url, control)
            .await
    }

    async fn create_with_refresh(&self, request: &CheckoutRequest) -> Attempt {
        let Some(credential) = self.session.credential() else {
            return Attempt::NeedsLogin;
        };
        match self.backend.create_checkout_session(&credential, request).await {
            Ok(session) => Attempt::Created(session),
            Err(err) if err.is_unauthorized() => {
                info!("Checkout unauthorized; refreshing once");
                let Ok(refreshed) = self.session.refresh().await else {
                    return Attempt::NeedsLogin;
                };
                match self.backend.create_checkout_session(&refreshed, request).await {
                    Ok(session) => Attempt::Created(session),
                    Err(err) if err.is_unauthorized() => Attempt::NeedsLogin,
                    Err(err) => Attempt::Failed(err),
                }
            }
            Err(err) => Attempt::Failed(err),
        }
    }

    fn known_plan(&self, plan: &str) -> Result<String> {
        let plan = plan.trim();
        self.plans
            .iter()
            .find(|known| known.eq_ignore_ascii_case(plan))
            .cloned()
            .ok_or_else(|| {
                GateError::InvalidArgument(format!(
                    "Unknown plan '{plan}' (available: {})",
                    self.plans.join(", ")
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct CountingControl {
        disabled: AtomicUsize,
        enabled: AtomicUsize,
    }

    impl SubmitControl for CountingControl {
        fn set_enabled(&self, enabled: bool) {
            if enabled {
                self.enabled.fetch_add(1, Ordering::SeqCst);
            } else {
                self.disabled.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn guard_blocks_second_submission_and_restores() {
        let control = CountingControl::default();
        let in_flight = AtomicBool::new(false);
        let guard = ControlGuard::acquire(&control, &in_flight).unwrap();
        assert!(ControlGuard::acquire(&control, &in_flight).is_none());
        drop(guard);
        assert_eq!(control.disabled.load(Ordering::SeqCst), 1);
        assert_eq!(control.enabled.load(Ordering::SeqCst), 1);
        assert!(!in_flight.load(Ordering::SeqCst));
    }

    #[test]
    fn guard_leaves_control_disabled_when_navigating() {
        let control = CountingControl::default();
        let in_flight = AtomicBool::new(false);
        let mut guard = ControlGuard::acquire(&control, &in_flight).unwrap();
        guard.navigating_away();
        drop(guard);
        assert_eq!(control.enabled.load(Ordering::SeqCst), 0);
        assert!(!in_flight.load(Ordering::SeqCst));
    }
}
