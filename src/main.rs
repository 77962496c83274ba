//! statement-gate CLI binary entry point.

use clap::Parser;
use statement_gate::cli::{AuthCommands, Cli, Commands, IntentCommands};
use statement_gate::config::GateConfig;
use statement_gate::Gate;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("STATEMENT_GATE_LOG")
                .unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let gate = match GateConfig::load(cli.config.as_deref()).and_then(Gate::from_config) {
        Ok(gate) => gate,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    gate.session.initialize().await;

    let result = match &cli.command {
        Commands::Auth(auth_args) => match &auth_args.command {
            AuthCommands::Login(args) => statement_gate::cli::auth::handle_login(&gate, args).await,
            AuthCommands::Signup(args) => {
                statement_gate::cli::auth::handle_signup(&gate, args).await
            }
            AuthCommands::Status => statement_gate::cli::auth::handle_status(&gate).await,
            AuthCommands::Logout => statement_gate::cli::auth::handle_logout(&gate).await,
        },
        Commands::Checkout(args) => {
            statement_gate::cli::checkout::handle_checkout(&gate, args).await
        }
        Commands::Intent(intent_args) => match intent_args.command {
            IntentCommands::Show => statement_gate::cli::checkout::handle_intent_show(&gate),
            IntentCommands::Clear => statement_gate::cli::checkout::handle_intent_clear(&gate),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
