use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

use commands::{AnalyzeArgs, BacktestArgs, ReportArgs, RunArgs};

#[derive(Parser)]
#[command(name = "smirk-trade")]
#[command(about = "Volatility-smirk options sentiment trader", long_about = None)]
struct Cli {
    /// Append logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduled trading cycle until SIGINT/SIGTERM
    Run(RunArgs),
    /// Run one cycle over a fixture and print skew, sentiment and signals
    Analyze(AnalyzeArgs),
    /// Replay an event log and print performance
    Backtest(BacktestArgs),
    /// Write the daily risk report from a returns CSV
    Report(ReportArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if let Some(path) = &cli.log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Run(args) => commands::run_bot(args).await?,
        Commands::Analyze(args) => commands::run_analyze(args).await?,
        Commands::Backtest(args) => commands::run_backtest(&args)?,
        Commands::Report(args) => commands::run_report(&args)?,
    }

    Ok(())
}
