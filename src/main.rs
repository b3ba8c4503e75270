use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fallacy_review::app::AppState;
use fallacy_review::model::Config;
use fallacy_review::service::RetrainOutcome;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present (ignore if missing)
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let check_interval = config.retraining.check_interval();

    let state = AppState::new(config).await?;

    if state.detection_client.health_check().await {
        tracing::info!("Fallacy detection service is healthy");
    } else {
        tracing::warn!("Fallacy detection service is unreachable, arguments will stay unchecked until it recovers");
    }

    tracing::info!(interval_secs = check_interval.as_secs(), "Starting retraining scheduler");

    let mut ticker = tokio::time::interval(check_interval);
    // The first tick completes immediately; skip it so startup does not trigger a cycle
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match state.retraining_service.check_retraining_threshold().await {
                    Ok(Some(RetrainOutcome::Submitted { samples })) => {
                        tracing::info!(samples, "Retraining cycle submitted");
                    }
                    Ok(Some(outcome)) => tracing::info!(?outcome, "Retraining cycle finished"),
                    Ok(None) => tracing::debug!("No argument reached the appeal threshold"),
                    Err(e) => tracing::error!(error = %e, "Retraining check failed"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown requested");
                break;
            }
        }
    }

    state.annotation_queue.shutdown().await;

    Ok(())
}
