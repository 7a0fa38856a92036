//! Cartwheel CLI - Database migrations and token tools.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations
//! cw-cli migrate
//!
//! # Mint a bearer token for user 7
//! cw-cli token issue --user-id 7
//!
//! # Mint an admin token valid for 15 minutes
//! cw-cli token issue --user-id 1 --role admin --minutes 15
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

use cartwheel_core::Role;

mod commands;

#[derive(Parser)]
#[command(name = "cw-cli")]
#[command(author, version, about = "Cartwheel CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Mint bearer tokens
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
}

#[derive(Subcommand)]
enum TokenAction {
    /// Issue a signed token for a user
    Issue {
        /// User id placed in the `sub` claim
        #[arg(short, long)]
        user_id: i32,

        /// User role (`customer`, `admin`)
        #[arg(short, long, default_value = "customer")]
        role: Role,

        /// Lifetime override in minutes
        #[arg(short, long)]
        minutes: Option<i64>,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Token { action } => match action {
            TokenAction::Issue {
                user_id,
                role,
                minutes,
            } => commands::token::issue(user_id, role, minutes)?,
        },
    }
    Ok(())
}
