use anyhow::{Context, Result};
use clap::Parser;

use salesdesk_ledger::db::LedgerDb;

const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

#[derive(Parser, Debug)]
#[command(name = "ledger-migrate", about = "Apply the incentive ledger schema")]
struct Args {
    /// Postgres connection string; falls back to DB_URL / DATABASE_URL.
    #[arg(long)]
    db_url: Option<String>,
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
    let db_url = args
        .db_url
        .or_else(|| std::env::var("DB_URL").ok())
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .context("--db-url or DB_URL is required")?;

    let db = LedgerDb::connect(db_url.as_str()).await?;
    let client = db.client();
    let client = client.lock().await;
    client
        .batch_execute(SCHEMA)
        .await
        .context("apply ledger schema")?;

    tracing::info!("ledger schema applied");
    Ok(())
}
