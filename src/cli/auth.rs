//! CLI auth command handlers for login, signup, status, and logout.

use crate::checkout::{CheckoutOutcome, NoControl};
use crate::gate::Gate;
use crate::redirect::Navigation;

use super::{LoginArgs, SignupArgs};

type CliResult = Result<(), Box<dyn std::error::Error>>;

pub async fn handle_login(gate: &Gate, args: &LoginArgs) -> CliResult {
    let navigation = match gate
        .redirect
        .login_and_redirect(&args.email, &args.password, args.redirect.as_deref())
        .await
    {
        Ok(navigation) => navigation,
        Err(e) => {
            eprintln!("❌ {}", e.user_message());
            return Err(e.into());
        }
    };
    follow(gate, navigation).await
}

pub async fn handle_signup(gate: &Gate, args: &SignupArgs) -> CliResult {
    let navigation = match gate
        .redirect
        .signup_and_redirect(
            &args.email,
            &args.password,
            args.name.as_deref(),
            args.redirect.as_deref(),
        )
        .await
    {
        Ok(navigation) => navigation,
        Err(e) => {
            eprintln!("❌ {}", e.user_message());
            return Err(e.into());
        }
    };
    follow(gate, navigation).await
}

pub async fn handle_status(gate: &Gate) -> CliResult {
    if !gate.session.is_authenticated() {
        match gate.session.credential() {
            Some(_) => println!("⚠️  Session expired. Run `statement-gate auth login`."),
            None => println!("Not signed in."),
        }
        return Ok(());
    }

    // Pick up today's usage; the cached profile is fine if this fails.
    let profile = match gate.session.fetch_profile().await {
        Ok(profile) => Some(profile),
        Err(_) => gate.session.user(),
    };
    match profile {
        Some(profile) => {
            println!("✅ Signed in as {}", profile.display_name());
            println!("   Email:   {}", profile.email);
            println!("   Plan:    {}", profile.account_type);
            println!(
                "   Usage:   {}/{} conversions today ({} left)",
                profile.daily_generations_used,
                profile.daily_limit,
                profile.remaining_generations()
            );
        }
        None => println!("✅ Signed in (profile unavailable)"),
    }
    if let Some(expires_at) = gate.session.credential().and_then(|c| c.expires_at) {
        println!("   Expires: {}", expires_at.format("%Y-%m-%d %H:%M UTC"));
    }
    Ok(())
}

pub async fn handle_logout(gate: &Gate) -> CliResult {
    let was_signed_in = gate.session.credential().is_some();
    gate.session.logout().await?;
    if was_signed_in {
        println!("✅ Signed out");
    } else {
        println!("Not signed in.");
    }
    Ok(())
}

/// Carry out a post-login navigation, resuming checkout when requested.
async fn follow(gate: &Gate, navigation: Navigation) -> CliResult {
    match navigation {
        Navigation::Stay { message } => {
            eprintln!(
                "❌ {}",
                message.unwrap_or_else(|| "Sign-in failed".to_string())
            );
            std::process::exit(1);
        }
        Navigation::Proceed => {
            println!("✅ Signed in");
            Ok(())
        }
        Navigation::Redirect { target, resume } => {
            println!("✅ Signed in");
            println!("➡️  Continue to {target}");
            let Some(resume) = resume else {
                return Ok(());
            };
            println!(
                "🛒 Resuming checkout: {} ({})",
                resume.plan, resume.billing_period
            );
            let outcome = gate.checkout.resume(&resume, &target, &NoControl).await?;
            super::checkout::print_outcome(&outcome);
            if matches!(outcome, CheckoutOutcome::Failed { .. }) {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}
