mod commands;
mod config;
mod report;

use clap::{Parser, Subcommand};
use config::CliConfig;
use raffle_engine::RaffleError;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "raffle")]
#[command(about = "Raffle engine simulator - rounds, collectibles and attack scenarios")]
#[command(version)]
struct Cli {
    /// Data directory for saved reports
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run raffle rounds end to end
    Simulate(commands::SimulateArgs),

    /// Attack scenarios against a profile
    #[command(subcommand)]
    Attack(commands::AttackCommands),

    /// Measure duplicate-check cost against roster size
    Scaling(commands::ScalingArgs),

    /// Saved report commands
    #[command(subcommand)]
    Report(commands::ReportCommands),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "raffle={},raffle_engine={}",
            log_level, log_level
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = CliConfig::new(cli.data_dir, cli.verbose);

    // Ensure data directory exists
    tokio::fs::create_dir_all(&config.data_dir).await?;

    // Execute command
    let result = match cli.command {
        Commands::Simulate(args) => commands::handle_simulate(args, &config).await,
        Commands::Attack(cmd) => commands::handle_attack_command(cmd, &config).await,
        Commands::Scaling(args) => commands::handle_scaling(args, &config).await,
        Commands::Report(cmd) => commands::handle_report_command(cmd, &config).await,
    };

    if let Err(e) = result {
        match e.downcast_ref::<RaffleError>() {
            Some(RaffleError::NotEnoughPlayers { required, active }) => {
                eprintln!("Error: Not enough players ({} of {})", active, required);
                eprintln!("Use '--players' to enter at least {} per round", required);
            }
            Some(RaffleError::InvalidConfig(msg)) => {
                eprintln!("Error: Invalid raffle configuration: {}", msg);
            }
            Some(err) => {
                eprintln!("Error [{}]: {}", err.code(), err);
            }
            None => {
                eprintln!("Error: {:#}", e);
            }
        }
        std::process::exit(1);
    }

    Ok(())
}
