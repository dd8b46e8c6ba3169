pub mod aggregation;
pub mod error;
pub mod newrelic;
pub mod query;

use aggregation::MetricsResponse;
use error::{PulseError, PulseResult};
use newrelic::{MetricsSource, NerdGraphClient};
use query::DateRange;
use std::collections::HashSet;
use tokio::time::Duration;
use tracing::{info, info_span, Instrument};

/// Facet tuple of a gateway result row: (account, service, day bucket, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Facet {
    pub account_id: String,
    pub service_id: String,
    /// Day bucket as `YYYYMMDD`.
    pub date: String,
    pub extra: Vec<String>,
}

impl Facet {
    pub fn new(account_id: impl Into<String>, service_id: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            service_id: service_id.into(),
            date: date.into(),
            extra: Vec::new(),
        }
    }

    pub fn from_values(values: Vec<String>) -> PulseResult<Self> {
        if values.len() < 3 {
            return Err(PulseError::MalformedRow { facet: values });
        }

        let mut values = values.into_iter();
        let account_id = values.next().unwrap_or_default();
        let service_id = values.next().unwrap_or_default();
        let date = values.next().unwrap_or_default();

        Ok(Self {
            account_id,
            service_id,
            date,
            extra: values.collect(),
        })
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        [self.account_id.as_str(), self.service_id.as_str(), self.date.as_str()]
            .into_iter()
            .chain(self.extra.iter().map(String::as_str))
    }

    pub fn contains_any(&self, ids: &HashSet<String>) -> bool {
        self.values().any(|value| ids.contains(value))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceRow {
    pub facet: Facet,
    pub total_requests: f64,
    pub total_5xx: f64,
    pub success_percentage: f64,
    pub latency: f64,
    pub integration_latency: f64,
    pub latency_count: f64,
}

impl ServiceRow {
    pub fn new(facet: Facet) -> Self {
        Self {
            facet,
            total_requests: 0.0,
            total_5xx: 0.0,
            success_percentage: 0.0,
            latency: 0.0,
            integration_latency: 0.0,
            latency_count: 0.0,
        }
    }

    pub fn with_counts(mut self, total_requests: f64, total_5xx: f64) -> Self {
        self.total_requests = total_requests;
        self.total_5xx = total_5xx;
        self
    }

    pub fn with_success_percentage(mut self, success_percentage: f64) -> Self {
        self.success_percentage = success_percentage;
        self
    }

    pub fn with_latency(mut self, latency: f64, integration_latency: f64, latency_count: f64) -> Self {
        self.latency = latency;
        self.integration_latency = integration_latency;
        self.latency_count = latency_count;
        self
    }
}

#[derive(Debug, Clone)]
pub struct PulseConfig {
    pub endpoint: String,
    pub analytics_account_id: String,
    pub upstream_account_ids: Vec<String>,
    pub service_ids: Vec<String>,
    pub days_ago: u32,
    // Server-side NRQL timeout hint
    pub query_timeout: u32,
    pub request_timeout: Duration,
    pub api_key: Option<String>,
    pub bind_address: String,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.newrelic.com/graphql".to_string(),
            analytics_account_id: "1747307".to_string(),
            // test, demo, prod
            upstream_account_ids: vec![
                "381491980507".to_string(),
                "010526243585".to_string(),
                "905418104963".to_string(),
            ],
            service_ids: vec![
                "eor-people-hub-bff-test-api".to_string(),
                "eor-people-hub-bff-demo-api".to_string(),
                "eor-people-hub-bff-prod-api".to_string(),
            ],
            days_ago: 3,
            query_timeout: 200,
            request_timeout: Duration::from_secs(30),
            api_key: None,
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

impl PulseConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(endpoint) = std::env::var("NEW_RELIC_ENDPOINT") {
            config.endpoint = endpoint;
        }

        if let Ok(account_id) = std::env::var("NEW_RELIC_ACCOUNT_ID") {
            config.analytics_account_id = account_id.trim().to_string();
        }

        if let Ok(ids) = std::env::var("UPSTREAM_ACCOUNT_IDS") {
            config.upstream_account_ids = split_list(&ids);
        }

        if let Ok(ids) = std::env::var("SERVICE_IDS") {
            config.service_ids = split_list(&ids);
        }

        if let Ok(days_ago) = std::env::var("DAYS_AGO") {
            config.days_ago = days_ago.parse().unwrap_or(3);
        }

        if let Ok(timeout) = std::env::var("NRQL_TIMEOUT") {
            config.query_timeout = timeout.parse().unwrap_or(200);
        }

        if let Ok(seconds) = std::env::var("REQUEST_TIMEOUT_SECONDS") {
            config.request_timeout = Duration::from_secs(seconds.parse().unwrap_or(30));
        }

        if let Ok(api_key) = std::env::var("NEW_RELIC_API_KEY") {
            config.api_key = Some(api_key).filter(|key| !key.is_empty());
        }

        if let Ok(bind_addr) = std::env::var("BIND_ADDRESS") {
            config.bind_address = bind_addr;
        }

        config
    }

    pub fn known_service_ids(&self) -> HashSet<String> {
        self.service_ids.iter().cloned().collect()
    }

    pub fn require_api_key(&self) -> PulseResult<&str> {
        self.api_key.as_deref().ok_or_else(|| PulseError::Config {
            message: "NEW_RELIC_API_KEY environment variable is required".to_string(),
        })
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Runs one metrics invocation: date window, fetch, aggregate.
pub struct MetricsService<S = NerdGraphClient> {
    source: S,
    days_ago: u32,
    known_service_ids: HashSet<String>,
}

impl MetricsService<NerdGraphClient> {
    pub fn new(config: &PulseConfig) -> Self {
        Self::with_source(NerdGraphClient::new(config), config)
    }
}

impl<S: MetricsSource> MetricsService<S> {
    pub fn with_source(source: S, config: &PulseConfig) -> Self {
        Self {
            source,
            days_ago: config.days_ago,
            known_service_ids: config.known_service_ids(),
        }
    }

    pub async fn get_metrics(&self, api_key: &str) -> PulseResult<MetricsResponse> {
        let invocation_id = uuid::Uuid::new_v4().to_string();
        let span = info_span!("get_metrics", invocation_id = %invocation_id);

        async {
            let range = DateRange::ending_today(self.days_ago);
            let rows = self.source.fetch_rows(api_key, &range).await.map_err(|e| {
                tracing::error!("Error in get_metrics: {}", e);
                e
            })?;

            let response = aggregation::summarize(&rows, &self.known_service_ids);
            info!(
                "Aggregated {} results into {} services",
                response.total_results,
                response.data.len()
            );
            Ok::<_, PulseError>(response)
        }
        .instrument(span)
        .await
    }
}
