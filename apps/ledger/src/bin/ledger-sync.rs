use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use clap::Parser;
use tracing::info;

use salesdesk_ledger::config::Config;
use salesdesk_ledger::sync::service::ReconcileWindow;

#[derive(Parser, Debug)]
#[command(
    name = "ledger-sync",
    about = "Run one incentive reconciliation pass over the lead source"
)]
struct Args {
    /// Window start date (YYYY-MM-DD, inclusive).
    #[arg(long)]
    from: NaiveDate,
    /// Window end date (YYYY-MM-DD, inclusive).
    #[arg(long)]
    to: NaiveDate,
    /// Actor recorded on the audit trail.
    #[arg(long, default_value = "system")]
    actor: String,
    /// Optional time-box in seconds; the job stops cleanly once exceeded.
    #[arg(long)]
    deadline_seconds: Option<i64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = Config::from_env().context("load config")?;
    let state = salesdesk_ledger::build_postgres_state(&config).await?;

    let start = args.from.and_time(NaiveTime::MIN).and_utc();
    let end = args
        .to
        .and_hms_opt(23, 59, 59)
        .context("window end out of range")?
        .and_utc();
    let mut window = ReconcileWindow::new(start, end);
    window.deadline = args
        .deadline_seconds
        .map(|seconds| Utc::now() + Duration::seconds(seconds));

    let summary = state.sync.reconcile(window, args.actor.as_str()).await?;
    info!(
        created = summary.created,
        skipped = summary.skipped,
        errors = summary.errors.len(),
        halted = summary.halted,
        "reconciliation summary"
    );
    for error in &summary.errors {
        tracing::warn!(record = %error, "reconciliation error");
    }
    Ok(())
}
