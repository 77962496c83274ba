//! CLI handlers for checkout and the pending intent.

use crate::checkout::{CheckoutOutcome, NoControl};
use crate::gate::Gate;

use super::CheckoutArgs;

type CliResult = Result<(), Box<dyn std::error::Error>>;

pub async fn handle_checkout(gate: &Gate, args: &CheckoutArgs) -> CliResult {
    let outcome = gate
        .checkout
        .start_checkout(&args.plan, args.period, args.return_page(&gate.config), &NoControl)
        .await?;
    print_outcome(&outcome);
    if matches!(outcome, CheckoutOutcome::Failed { .. }) {
        std::process::exit(1);
    }
    Ok(())
}

pub fn handle_intent_show(gate: &Gate) -> CliResult {
    match gate.redirect.pending_intent()? {
        Some(intent) => {
            println!("Pending intent {}", intent.id);
            println!("   Kind:    {}", intent.kind);
            if let Some(plan) = &intent.plan {
                println!(
                    "   Plan:    {plan} ({})",
                    intent.billing_period.unwrap_or_default()
                );
            }
            println!("   Return:  {}", intent.return_url);
            println!(
                "   Created: {}",
                intent.created_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
        }
        None => println!("No pending intent."),
    }
    Ok(())
}

pub fn handle_intent_clear(gate: &Gate) -> CliResult {
    gate.redirect.discard_intent()?;
    println!("✅ Pending intent cleared");
    Ok(())
}

pub(crate) fn print_outcome(outcome: &CheckoutOutcome) {
    match outcome {
        CheckoutOutcome::Redirect { checkout_url } => {
            println!("💳 Complete payment at: {checkout_url}");
        }
        CheckoutOutcome::LoginRequired { login_url } => {
            println!("🔐 Sign in first: {login_url}");
            println!("   Your plan choice is saved and resumes after `statement-gate auth login`.");
        }
        CheckoutOutcome::AlreadyInFlight => {
            println!("⏳ A checkout is already in progress");
        }
        CheckoutOutcome::Failed { message } => {
            eprintln!("❌ {message}");
        }
    }
}
