use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::get,
    Router,
};
use pulse::{aggregation::MetricsResponse, error::PulseError, MetricsService, PulseConfig};
use serde::Serialize;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

struct AppState {
    service: MetricsService,
    api_key: Option<String>,
}

type SharedState = Arc<AppState>;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    info!("Starting pulse metrics server");

    let config = PulseConfig::from_env();

    info!("New Relic endpoint: {}", config.endpoint);
    info!("Analytics account: {}", config.analytics_account_id);
    info!("Services: {:?}", config.service_ids);
    info!("Days ago: {}", config.days_ago);

    let state = Arc::new(AppState {
        service: MetricsService::new(&config),
        api_key: config.api_key.clone(),
    });

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(get_metrics))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .into_inner(),
        )
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!("Server listening on {}", config.bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn get_metrics(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<MetricsResponse>, (StatusCode, Json<ErrorResponse>)> {
    let api_key = headers
        .get("API-Key")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .or_else(|| state.api_key.clone());

    let Some(api_key) = api_key else {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "Missing New Relic API key".to_string(),
            }),
        ));
    };

    match state.service.get_metrics(&api_key).await {
        Ok(response) => Ok(Json(response)),
        Err(e) => {
            error!("Metrics query failed: {}", e);
            Err((
                status_for(&e),
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            ))
        }
    }
}

fn status_for(error: &PulseError) -> StatusCode {
    match error {
        PulseError::NoResults => StatusCode::NOT_FOUND,
        PulseError::Fetch { .. }
        | PulseError::Transport(_)
        | PulseError::Query { .. }
        | PulseError::MalformedRow { .. } => StatusCode::BAD_GATEWAY,
        PulseError::Serialization(_) | PulseError::Config { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
