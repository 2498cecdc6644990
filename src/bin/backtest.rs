use chrono::NaiveDate;
use clap::Parser;
use surgecast::application::bootstrap::build_engine;
use surgecast::config::Config;
use surgecast::domain::performance::{PerformanceSnapshot, ReturnMode};
use surgecast::domain::repositories::SignalRepository;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Replay stored signals through the cost model over a date range.
#[derive(Parser)]
#[command(name = "backtest", version)]
struct Cli {
    /// First issue date included (YYYY-MM-DD).
    #[arg(long)]
    start: NaiveDate,
    /// Last issue date included (YYYY-MM-DD).
    #[arg(long)]
    end: NaiveDate,
    /// Annualize the Sharpe-like ratio by sqrt(252).
    #[arg(long)]
    annualize: bool,
}

fn print_snapshot(label: &str, snapshot: &PerformanceSnapshot) {
    println!("--- {label} ---");
    println!(
        "  signals {} | resolved {} | win rate {}",
        snapshot.total_signals, snapshot.resolved_count, snapshot.win_rate
    );
    println!(
        "  avg return {} | median {}",
        snapshot.avg_return, snapshot.median_return
    );
    println!(
        "  total (independent) {} | total (compounded) {}",
        snapshot.total_return(ReturnMode::IndependentTrade),
        snapshot.total_return(ReturnMode::Compounding)
    );
    println!(
        "  max drawdown {} | longest loss streak {} | sharpe{} {}",
        snapshot.max_drawdown,
        snapshot.longest_loss_streak,
        if snapshot.sharpe_annualized {
            " (annualized)"
        } else {
            ""
        },
        snapshot.sharpe_like_ratio
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    anyhow::ensure!(cli.start <= cli.end, "--start must not be after --end");

    let config = Config::from_env()?;
    let engine = build_engine(&config)?;

    let signals: Vec<_> = engine
        .store
        .all_signals()?
        .into_iter()
        .filter(|s| s.issue_date >= cli.start && s.issue_date <= cli.end)
        .collect();
    info!(
        signals = signals.len(),
        start = %cli.start,
        end = %cli.end,
        "replaying stored signals"
    );

    let report = engine.simulator.replay(&signals, cli.annualize).await?;

    print_snapshot("overall", &report.snapshot);
    println!("  excluded (no trade-date bar): {}", report.excluded);

    for (tier, snapshot) in report.snapshots_by_tier(&signals, cli.annualize) {
        print_snapshot(&format!("tier >= {tier:.2}"), &snapshot);
    }

    Ok(())
}
