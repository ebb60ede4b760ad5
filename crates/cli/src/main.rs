//! Checkout POS CLI - Database migrations and connector management.
//!
//! # Usage
//!
//! ```bash
//! # Run connector database migrations
//! kis-cli migrate
//!
//! # Mirror a store user
//! kis-cli user upsert --id 1 -e owner@example.com -n "Shop Owner" -r administrator
//!
//! # List mirrored users
//! kis-cli user list
//!
//! # Run the system audit against the configured environment
//! kis-cli audit
//!
//! # Drop the connection without a user (tells Checkout POS when connected)
//! kis-cli disconnect --force
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "kis-cli")]
#[command(author, version, about = "Checkout POS connector CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage mirrored store users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Run the system audit and print the report
    Audit,
    /// Disconnect from Checkout POS
    Disconnect {
        /// Skip the permission check and notify Checkout POS
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create or update a user
    Upsert {
        /// WordPress user id
        #[arg(long)]
        id: i64,

        /// Email address
        #[arg(short, long)]
        email: String,

        /// Display name
        #[arg(short, long, default_value = "")]
        name: String,

        /// Role (`administrator`, `shop_manager`, `editor`, `author`, `customer`)
        #[arg(short, long, default_value = "shop_manager")]
        role: String,
    },
    /// List users
    List,
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
        Commands::User { action } => match action {
            UserAction::Upsert {
                id,
                email,
                name,
                role,
            } => commands::user::upsert(id, &email, &name, &role).await?,
            UserAction::List => commands::user::list().await?,
        },
        Commands::Audit => commands::connection::audit().await?,
        Commands::Disconnect { force } => commands::connection::disconnect(force).await?,
    }
    Ok(())
}
