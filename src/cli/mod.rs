//! CLI entry point for statement-gate.

pub mod auth;
pub mod checkout;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::GateConfig;
use crate::intent::BillingPeriod;

/// Statement converter session CLI
#[derive(Parser, Debug)]
#[command(
    name = "statement-gate",
    version,
    about = "Sign in, check out and inspect the statement converter session"
)]
pub struct Cli {
    /// Config file (defaults to ~/.statement-gate/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Authentication management
    Auth(AuthArgs),
    /// Start checkout for a plan
    Checkout(CheckoutArgs),
    /// Inspect or clear the pending post-login intent
    Intent(IntentArgs),
}

#[derive(Args, Debug)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub command: AuthCommands,
}

#[derive(Subcommand, Debug)]
pub enum AuthCommands {
    /// Sign in and follow the post-login redirect
    Login(LoginArgs),
    /// Create an account and follow the post-login redirect
    Signup(SignupArgs),
    /// Show authentication status
    Status,
    /// Sign out
    Logout,
}

/// Arguments for `statement-gate auth login`.
#[derive(Args, Debug)]
pub struct LoginArgs {
    #[arg(long)]
    pub email: String,

    #[arg(long)]
    pub password: String,

    /// Value of the login page's `redirect` query parameter
    #[arg(long)]
    pub redirect: Option<String>,
}

/// Arguments for `statement-gate auth signup`.
#[derive(Args, Debug)]
pub struct SignupArgs {
    #[arg(long)]
    pub email: String,

    #[arg(long)]
    pub password: String,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub redirect: Option<String>,
}

/// Arguments for `statement-gate checkout`.
#[derive(Args, Debug)]
pub struct CheckoutArgs {
    /// Plan name (starter, professional, business)
    pub plan: String,

    /// Billing period
    #[arg(short, long, default_value = "monthly")]
    pub period: BillingPeriod,

    /// Page the purchase starts from (defaults to the configured pricing page)
    #[arg(long)]
    pub from: Option<String>,
}

impl CheckoutArgs {
    /// Page the buyer returns to if sign-in is needed first.
    pub fn return_page<'a>(&'a self, config: &'a GateConfig) -> &'a str {
        self.from.as_deref().unwrap_or(&config.pricing_path)
    }
}

#[derive(Args, Debug)]
pub struct IntentArgs {
    #[command(subcommand)]
    pub command: IntentCommands,
}

#[derive(Subcommand, Debug)]
pub enum IntentCommands {
    /// Print the pending intent
    Show,
    /// Delete the pending intent
    Clear,
}
