use dashboard::Dashboard;
use repcount_core::{reshape_with_stats, AppConfig, CoreError, Credentials, ErrorReporter};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use twitter_client::{ClientConfig, TimelineFetcher, TwitterApiClient};

const PROGRAM: &str = "repcount";
const DEFAULT_LOG_FILTER: &str = "repcount=info,twitter_client=info,dashboard=info";

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    tracing::info!("Starting repcount");

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", fatal_message(&e));
            ExitCode::FAILURE
        }
    }
}

/// The single stderr line for an error that ends the run.
fn fatal_message(error: &CoreError) -> String {
    ErrorReporter::new(PROGRAM).report_error(error)
}

async fn run() -> Result<(), CoreError> {
    let mut config = AppConfig::load()?;
    if let Some(screen_name) = std::env::args().nth(1) {
        config = config.with_screen_name(&screen_name)?;
    }
    let credentials = Credentials::load()?;

    tracing::info!("Fetching timeline of @{}", config.screen_name);

    let client = Arc::new(TwitterApiClient::new(
        credentials,
        ClientConfig::from(&config),
    )?);
    let fetcher = TimelineFetcher::new(Arc::clone(&client)).with_page_size(config.page_size);
    // One run, one fetch: TimelineCache is for callers that fetch repeatedly.
    let batch = fetcher.fetch_all(&config.screen_name).await?;

    let (records, stats) = reshape_with_stats(&batch);
    tracing::debug!("Reshape stats: {:?}", stats);
    tracing::info!(
        "{} of {} posts qualified, {} records",
        stats.qualifying_posts,
        stats.total_posts,
        records.len()
    );

    let dashboard = Dashboard::new(&config.screen_name, records);
    print!("{}", dashboard.table());
    for summary in dashboard.summary() {
        if let (Some(mean), Some(best)) = (summary.mean(), summary.best) {
            tracing::info!(
                "{}: {} sessions, mean {:.1}, best {}",
                summary.label,
                summary.sessions,
                mean,
                best
            );
        }
    }
    dashboard.write_to(&config.output_path)?;

    tracing::info!("API usage: {}", client.get_metrics().await.summary());
    let status = client.get_rate_limit_status().await;
    if let Some(budget) = status.server_budget {
        tracing::info!("{} timeline requests left in this window", budget.remaining);
    }
    Ok(())
}
