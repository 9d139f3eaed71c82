use anyhow::Result;
use chrono::NaiveDate;
use clap::{CommandFactory, Parser, Subcommand};
use fiatfx::core::log::init_logging;
use rust_decimal::Decimal;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for fiatfx::AppCommand {
    fn from(cmd: Commands) -> fiatfx::AppCommand {
        match cmd {
            Commands::Quote { currency, provider } => {
                fiatfx::AppCommand::Quote { currency, provider }
            }
            Commands::Convert { amount, date } => fiatfx::AppCommand::Convert { amount, date },
            Commands::ToAmount { fiat } => fiatfx::AppCommand::ToAmount { fiat },
            Commands::History { date } => fiatfx::AppCommand::History { date },
            Commands::Currencies { history } => fiatfx::AppCommand::Currencies { history },
            Commands::GenerateIndex { output } => fiatfx::AppCommand::GenerateIndex { output },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Show the current exchange rate
    Quote {
        /// Switch to this fiat currency (persisted)
        #[arg(long)]
        currency: Option<String>,
        /// Switch to this rate provider (persisted)
        #[arg(long)]
        provider: Option<String>,
    },
    /// Convert a coin amount to fiat
    Convert {
        amount: Decimal,
        /// Use the rate of this day (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Convert a fiat amount to coins
    ToAmount { fiat: Decimal },
    /// Show the historical rate of a day (YYYY-MM-DD)
    History { date: NaiveDate },
    /// List supported currencies
    Currencies {
        /// Only currencies with historical rates
        #[arg(long)]
        history: bool,
    },
    /// Probe all providers and rebuild the currency index
    GenerateIndex {
        /// Write the index to this file instead of stdout
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => fiatfx::cli::setup::setup(),
        Some(cmd) => fiatfx::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
