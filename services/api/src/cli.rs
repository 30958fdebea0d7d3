use crate::server;
use clap::{Args, Parser, Subcommand};
use perm_tracker::config::AppConfig;
use perm_tracker::error::AppError;
use perm_tracker::processing::{
    estimate_approval, refresh_processing_data, DolScraper, SqliteStore,
};
use perm_tracker::telemetry;
use serde_json::json;

#[derive(Parser, Debug)]
#[command(
    name = "PERM Processing Time Tracker",
    about = "Track DOL PERM processing times and estimate case approval dates",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Run one scrape-and-store cycle against the configured source
    Refresh,
    /// Estimate an approval date without starting the server
    Estimate(EstimateArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

#[derive(Args, Debug)]
pub(crate) struct EstimateArgs {
    /// Filing date in YYYY-MM-DD form
    #[arg(long)]
    filing_date: String,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Refresh => run_refresh().await,
        Command::Estimate(args) => run_estimate(args).await,
    }
}

async fn run_refresh() -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let store = SqliteStore::connect(&config.store.database_url).await?;
    let scraper = DolScraper::new()?;
    let record =
        refresh_processing_data(&scraper, &store, &config.scraper.source_url).await?;

    let payload = json!({
        "average_days": record.average_days,
        "priority_date": record.priority_date,
        "last_updated": record.last_updated.to_rfc3339(),
        "data_source": record.data_source.as_str(),
    });
    println!("{payload:#}");
    Ok(())
}

async fn run_estimate(args: EstimateArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let store = SqliteStore::connect(&config.store.database_url).await?;

    let estimate = estimate_approval(&args.filing_date, &store).await?;
    let payload = json!({
        "estimated_approval_date": estimate.estimated_approval_date,
        "average_processing_days": estimate.average_processing_days,
        "last_updated": estimate.last_updated,
        "priority_date": estimate.priority_date,
        "data_source": estimate.data_source.as_str(),
    });
    println!("{payload:#}");
    Ok(())
}
