//! token-cli - OAuth2 token manager
//!
//! Obtains token pairs through an authorization backend, keeps them in a
//! local file, and refreshes or revokes them on demand.

mod auth;
mod clock;
mod commands;
mod config;
mod lifecycle;
mod models;
mod tokens;
mod tui;

use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Config;
use models::TokenId;

#[derive(Parser)]
#[command(name = "token-cli")]
#[command(about = "Obtain, inspect, refresh and revoke OAuth2 tokens", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the URL to start the authorization flow
    Login,

    /// Exchange an authorization code for a new token pair
    Callback {
        /// Code from the provider's redirect
        code: String,
    },

    /// List stored tokens and their remaining lifetime
    List,

    /// Refresh a token's access token
    Refresh {
        /// Token ID (from `list` output)
        id: TokenId,
    },

    /// Revoke a token with the provider and delete it
    Revoke {
        /// Token ID (from `list` output)
        id: TokenId,
    },

    /// Delete a stored token without contacting the provider
    Delete {
        /// Token ID (from `list` output)
        id: TokenId,
    },

    /// Launch the terminal user interface
    Tui,

    /// Show the effective configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        init: bool,
    },
}

/// Initialize tracing. In TUI mode, logs go to a file so they don't draw over the screen.
fn init_logging(verbose: bool, tui: bool) -> Result<()> {
    let filter = if verbose { "debug" } else { "info" };
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    if tui {
        let dir = Config::data_dir()?;
        std::fs::create_dir_all(&dir).context("Failed to create data directory")?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join("token-cli.log"))
            .context("Failed to open log file")?;
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init();
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, matches!(cli.command, Commands::Tui))?;

    let config = Config::load()?;
    let controller = || commands::controller(&config);

    match cli.command {
        Commands::Login => {
            tracing::info!("Requesting authorization URL...");
            commands::login(&controller()?).await?;
        }
        Commands::Callback { code } => {
            tracing::info!("Exchanging authorization code...");
            commands::callback(&controller()?, &code).await?;
        }
        Commands::List => {
            commands::list(&controller()?)?;
        }
        Commands::Refresh { id } => {
            commands::refresh(&controller()?, id).await?;
        }
        Commands::Revoke { id } => {
            commands::revoke(&controller()?, id).await?;
        }
        Commands::Delete { id } => {
            commands::delete(&controller()?, id)?;
        }
        Commands::Tui => {
            tui::run(Arc::new(controller()?)).await?;
        }
        Commands::Config { init } => {
            commands::show_config(&config, init)?;
        }
    }

    Ok(())
}
