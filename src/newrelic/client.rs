use super::types::{decode_rows, GraphQlRequest, GraphQlResponse};
use crate::error::{PulseError, PulseResult};
use crate::query::{DateRange, GatewayMetricsQuery};
use crate::{PulseConfig, ServiceRow};
use async_trait::async_trait;
use tokio::time::Duration;
use tracing::{debug, error, info};

/// Anything that can produce gateway result rows for a date window.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn fetch_rows(&self, api_key: &str, range: &DateRange) -> PulseResult<Vec<ServiceRow>>;
}

/// NerdGraph client issuing the gateway health query. Single attempt, no retries.
pub struct NerdGraphClient {
    client: reqwest::Client,
    endpoint: String,
    analytics_account_id: String,
    upstream_account_ids: Vec<String>,
    query_timeout: u32,
    request_timeout: Duration,
}

impl NerdGraphClient {
    pub fn new(config: &PulseConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint.clone(),
            analytics_account_id: config.analytics_account_id.clone(),
            upstream_account_ids: config.upstream_account_ids.clone(),
            query_timeout: config.query_timeout,
            request_timeout: config.request_timeout,
        }
    }

    pub fn with_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn build_query(&self, range: &DateRange) -> GatewayMetricsQuery {
        GatewayMetricsQuery::new(
            self.analytics_account_id.clone(),
            self.upstream_account_ids.clone(),
            range.clone(),
        )
        .with_timeout(self.query_timeout)
    }

    async fn execute(&self, api_key: &str, query: &GatewayMetricsQuery) -> PulseResult<GraphQlResponse> {
        let request = GraphQlRequest {
            query: query.graphql()?,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("API-Key", api_key)
            .json(&request)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| {
                error!("New Relic request failed: {}", e);
                PulseError::Transport(e)
            })?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            error!("API Error Response: {} - {}", status, body);
            return Err(PulseError::Fetch {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl MetricsSource for NerdGraphClient {
    async fn fetch_rows(&self, api_key: &str, range: &DateRange) -> PulseResult<Vec<ServiceRow>> {
        info!("Starting New Relic query for {} to {}", range.start, range.end);

        let query = self.build_query(range);
        debug!("NRQL: {}", query.nrql());

        let raw = self.execute(api_key, &query).await?.into_results().map_err(|e| {
            error!("New Relic query returned no usable results: {}", e);
            e
        })?;

        info!("Total results: {}", raw.len());
        decode_rows(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> NerdGraphClient {
        let config = PulseConfig {
            endpoint: format!("{}/graphql", server.uri()),
            ..PulseConfig::default()
        };
        NerdGraphClient::new(&config)
    }

    fn range() -> DateRange {
        DateRange {
            start: "2024-01-01 00:00:00".to_string(),
            end: "2024-01-04 23:59:59".to_string(),
        }
    }

    fn results_body(results: serde_json::Value) -> serde_json::Value {
        json!({ "data": { "actor": { "account": { "nrql": { "results": results } } } } })
    }

    #[tokio::test]
    async fn test_fetch_rows_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(header("API-Key", "test-key-123"))
            .and(body_string_contains("SINCE '2024-01-01 00:00:00' UNTIL '2024-01-04 23:59:59'"))
            .respond_with(ResponseTemplate::new(200).set_body_json(results_body(json!([
                {
                    "facet": ["acct1", "svc-a", "20240101"],
                    "totalRequests": 100,
                    "total5xx": 2,
                    "successPercentage": 98,
                    "latency": 12.5,
                    "integrationLatency": 10.0,
                    "latencyCount": 100
                }
            ]))))
            .expect(1)
            .mount(&mock_server)
            .await;

        let rows = client_for(&mock_server)
            .fetch_rows("test-key-123", &range())
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].facet.service_id, "svc-a");
        assert_eq!(rows[0].total_requests, 100.0);
        assert_eq!(rows[0].latency, 12.5);
    }

    #[tokio::test]
    async fn test_http_error_is_fetch_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Invalid API key"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let result = client_for(&mock_server).fetch_rows("bad-key", &range()).await;

        match result {
            Err(PulseError::Fetch { status, body }) => {
                assert_eq!(status, 401);
                assert_eq!(body, "Invalid API key");
            }
            other => panic!("expected fetch error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_graphql_errors_are_query_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": null,
                "errors": [{ "message": "NRQL query timed out" }]
            })))
            .mount(&mock_server)
            .await;

        let result = client_for(&mock_server).fetch_rows("test-key", &range()).await;

        match result {
            Err(PulseError::Query { detail }) => assert!(detail.contains("NRQL query timed out")),
            other => panic!("expected query error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_results_are_no_results() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(results_body(json!([]))))
            .mount(&mock_server)
            .await;

        let result = client_for(&mock_server).fetch_rows("test-key", &range()).await;
        assert!(matches!(result, Err(PulseError::NoResults)));
    }

    #[tokio::test]
    async fn test_malformed_row_fails_whole_fetch() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(results_body(json!([
                { "facet": ["acct1", "svc-a", "20240101"], "totalRequests": 1 },
                { "facet": ["acct1"], "totalRequests": 1 }
            ]))))
            .mount(&mock_server)
            .await;

        let result = client_for(&mock_server).fetch_rows("test-key", &range()).await;
        assert!(matches!(result, Err(PulseError::MalformedRow { .. })));
    }

    #[tokio::test]
    async fn test_invalid_json_is_serialization_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
            .mount(&mock_server)
            .await;

        let result = client_for(&mock_server).fetch_rows("test-key", &range()).await;
        assert!(matches!(result, Err(PulseError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_client_timeout_is_transport_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(results_body(json!([])))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&mock_server)
            .await;

        let result = client_for(&mock_server)
            .with_timeout(Duration::from_millis(50))
            .fetch_rows("test-key", &range())
            .await;

        assert!(matches!(result, Err(PulseError::Transport(_))));
    }

    #[test]
    fn test_build_query_uses_configured_accounts() {
        let config = PulseConfig {
            analytics_account_id: "42".to_string(),
            upstream_account_ids: vec!["7".to_string()],
            query_timeout: 90,
            ..PulseConfig::default()
        };
        let query = NerdGraphClient::new(&config).build_query(&range());

        assert_eq!(query.analytics_account_id, "42");
        assert_eq!(query.timeout, 90);
        assert!(query.nrql().contains("aws.accountId IN (7)"));
    }
}
