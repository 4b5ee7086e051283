//! Forkful CLI - migrations, menu seeding and development helpers.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! fk-cli migrate
//!
//! # Load the menu from YAML
//! fk-cli seed menu --file crates/cli/menu.yaml
//!
//! # Mint a bearer token for local testing
//! fk-cli token issue --subject asha --staff
//!
//! # Sign a sandbox payment callback
//! fk-cli payment sign --intent order_sbx_... --transaction pay_123
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "fk-cli")]
#[command(author, version, about = "Forkful storefront CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run storefront database migrations
    Migrate,
    /// Seed the database
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Bearer token helpers
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
    /// Payment gateway helpers
    Payment {
        #[command(subcommand)]
        action: PaymentAction,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Insert or update menu items from a YAML file
    Menu {
        /// Path to the menu YAML file
        #[arg(short, long)]
        file: String,
    },
}

#[derive(Subcommand)]
enum TokenAction {
    /// Issue a bearer token signed with `STOREFRONT_TOKEN_SECRET`
    Issue {
        /// Subject id to embed in the token
        #[arg(short, long)]
        subject: String,

        /// Grant the staff role
        #[arg(long)]
        staff: bool,

        /// Token lifetime in hours
        #[arg(long, default_value_t = 24)]
        hours: i64,
    },
}

#[derive(Subcommand)]
enum PaymentAction {
    /// Sign a completion callback with `RAZORPAY_KEY_SECRET`
    Sign {
        /// Gateway intent (order) id
        #[arg(short, long)]
        intent: String,

        /// Gateway transaction (payment) id
        #[arg(short, long)]
        transaction: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::storefront().await?,
        Commands::Seed { target } => match target {
            SeedTarget::Menu { file } => commands::seed::menu(&file).await?,
        },
        Commands::Token { action } => match action {
            TokenAction::Issue {
                subject,
                staff,
                hours,
            } => commands::token::issue(&subject, staff, hours)?,
        },
        Commands::Payment { action } => match action {
            PaymentAction::Sign {
                intent,
                transaction,
            } => commands::payment::sign(&intent, &transaction)?,
        },
    }
    Ok(())
}
