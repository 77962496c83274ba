//! statement-gate: session, sign-in redirect and checkout controller for the
//! statement converter web client.
//!
//! One [`auth::AuthSession`] is created at startup and shared by the
//! [`redirect::RedirectController`] and the [`checkout::CheckoutInitiator`].
//! Navigation is returned as values ([`redirect::Navigation`],
//! [`checkout::CheckoutOutcome`]) for the host to carry out.
//!
//! # Quick Start
//!
//! ```no_run
//! use statement_gate::prelude::*;
//!
//! # async fn example() -> statement_gate::error::Result<()> {
//! let gate = Gate::from_config(GateConfig::from_env()?)?;
//! gate.session.initialize().await;
//!
//! let outcome = gate
//!     .checkout
//!     .start_checkout("professional", BillingPeriod::Yearly, "/pricing.html", &NoControl)
//!     .await?;
//! match outcome {
//!     CheckoutOutcome::Redirect { checkout_url } => println!("pay at {checkout_url}"),
//!     CheckoutOutcome::LoginRequired { login_url } => println!("sign in at {login_url}"),
//!     other => println!("{other:?}"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod checkout;
pub mod config;
pub mod error;
pub mod gate;
pub mod intent;
pub mod prelude;
pub mod redirect;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;

pub use gate::Gate;
