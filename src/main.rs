//! Wallet Analyzer - classifies wallets by transaction behavior
//!
//! A trained classifier labels each wallet. When it is unsure, the label of
//! the most similar known wallet is used instead.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;

// Use the library crate
use wallet_analyzer::cli::commands;
use wallet_analyzer::config::{Config, LoggingConfig};

/// Wallet Analyzer - wallet archetype classification service
#[derive(Parser)]
#[command(name = "wallet-analyzer")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml", env = "WALLET_ANALYZER_CONFIG")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP service
    Serve,

    /// Build the similarity index from the labeled dataset
    BuildIndex,

    /// Show wallets similar to an indexed wallet
    Similar {
        /// Wallet address
        address: String,

        /// Number of neighbors
        #[arg(short, default_value = "5")]
        k: usize,
    },

    /// Classify a wallet from a request JSON file
    Classify {
        /// Request file ({"address": ..., "transactions": [...]})
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Print the features extracted from a request JSON file
    Features {
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Talk to a running analyzer service
    Remote {
        #[command(subcommand)]
        action: RemoteAction,
    },

    /// Show current configuration
    Config,
}

#[derive(Subcommand)]
enum RemoteAction {
    /// Submit a request file for analysis
    Analyze {
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Check service health
    Health,
}

fn init_tracing(logging: &LoggingConfig) {
    // RUST_LOG wins over the configured level
    let directives = format!("wallet_analyzer={},tower_http=info", logging.level);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&directives))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("wallet_analyzer=info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    // Initialize tracing
    init_tracing(&config.logging);

    // Execute command
    let result = match cli.command {
        Commands::Serve => commands::serve(&config).await,
        Commands::BuildIndex => commands::build_index(&config),
        Commands::Similar { address, k } => commands::similar(&config, &address, k),
        Commands::Classify { input } => commands::classify(&config, &input),
        Commands::Features { input } => commands::features(&input),
        Commands::Remote { action } => match action {
            RemoteAction::Analyze { input } => commands::remote_analyze(&config, &input).await,
            RemoteAction::Health => commands::remote_health(&config).await,
        },
        Commands::Config => commands::show_config(&config),
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
