use pulse::{MetricsService, PulseConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = PulseConfig::from_env();
    let api_key = config.require_api_key()?;

    info!(
        "Querying {} services over the last {} days",
        config.service_ids.len(),
        config.days_ago
    );

    let service = MetricsService::new(&config);
    let response = service.get_metrics(api_key).await?;

    println!("{}", serde_json::to_string_pretty(&response)?);

    Ok(())
}
