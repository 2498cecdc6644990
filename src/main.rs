use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use surgecast::application::bootstrap::build_engine;
use surgecast::application::orchestrator::StepStatus;
use surgecast::config::Config;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "surgecast", about = "Daily surge-signal engine", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the daily sequence: resolve, report, generate, verify.
    Daily {
        /// Run as-of this date instead of today (YYYY-MM-DD).
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Override the configured universe (comma separated).
        #[arg(long, value_delimiter = ',')]
        symbols: Option<Vec<String>>,
    },
    /// Export the signal/trade history as CSV.
    Export {
        #[arg(long, default_value = "signal_history.csv")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let engine = build_engine(&config)?;

    match cli.command {
        Command::Daily { date, symbols } => {
            let today = date.unwrap_or_else(|| Local::now().date_naive());
            let universe = symbols.unwrap_or_else(|| engine.symbols.clone());
            info!(%today, universe = universe.len(), "starting daily run");

            let report = engine.orchestrator.run(today, &universe).await;

            if report.skipped_non_trading {
                info!(%today, "non-trading day, nothing to do");
                return Ok(());
            }
            if report.already_completed {
                info!(%today, "run already completed today");
                return Ok(());
            }
            for step in &report.steps {
                match step.status {
                    StepStatus::Completed => info!(step = step.name, detail = %step.detail, "ok"),
                    StepStatus::Failed => warn!(step = step.name, detail = %step.detail, "failed"),
                }
            }
            info!(new_signals = report.new_signals, "daily run finished");
            if !report.all_steps_completed() {
                anyhow::bail!("daily run finished with failed steps");
            }
        }
        Command::Export { output } => {
            let rows = engine.store.export_history_csv(&output)?;
            info!(rows, path = %output.display(), "history exported");
        }
    }

    Ok(())
}
