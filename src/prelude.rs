//! Convenience re-exports for common use.

pub use crate::auth::{AuthSession, AuthState, Credential, LoginOutcome, UserProfile};
pub use crate::checkout::{CheckoutInitiator, CheckoutOutcome, NoControl, SubmitControl};
pub use crate::config::GateConfig;
pub use crate::error::{GateError, Result};
pub use crate::gate::Gate;
pub use crate::intent::{BillingPeriod, Intent, ResumeCheckout};
pub use crate::redirect::{Navigation, RedirectController};
