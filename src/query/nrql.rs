use super::DateRange;
use crate::error::PulseResult;

const METRIC_SELECT: &str = "SELECT \
    100 - (sum(`aws.apigateway.5XXError`) + sum(`aws.apigateway.5xx`)) * 100 / sum(`aws.apigateway.Count`) AS 'successPercentage', \
    (sum(`aws.apigateway.5XXError`) + sum(`aws.apigateway.5xx`)) AS 'total5xx', \
    sum(`aws.apigateway.Count`) AS 'totalRequests', \
    average(`aws.apigateway.Latency`) AS 'latency', \
    average(`aws.apigateway.IntegrationLatency`) AS 'integrationLatency', \
    count(`aws.apigateway.Latency`) AS 'latencyCount' \
    FROM Metric";

const GATEWAY_DIMENSIONS: &str = "aws.apigateway.ApiName IS NOT NULL \
    AND aws.apigateway.Method IS NOT NULL \
    AND aws.apigateway.Resource IS NOT NULL \
    AND aws.apigateway.Stage IS NOT NULL";

const FACETS: &str = "FACET aws.accountId AS accountId, \
    aws.apigateway.ApiName AS apiName, \
    toDatetime(timestamp, 'yyyyMMdd') AS date";

/// API-gateway health query faceted by (account, API name, day).
#[derive(Debug, Clone)]
pub struct GatewayMetricsQuery {
    pub analytics_account_id: String,
    pub upstream_account_ids: Vec<String>,
    pub range: DateRange,
    pub timeout: u32,
}

impl GatewayMetricsQuery {
    pub fn new(
        analytics_account_id: impl Into<String>,
        upstream_account_ids: Vec<String>,
        range: DateRange,
    ) -> Self {
        Self {
            analytics_account_id: analytics_account_id.into(),
            upstream_account_ids,
            range,
            timeout: 200,
        }
    }

    pub fn with_timeout(mut self, timeout: u32) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn nrql(&self) -> String {
        format!(
            "{} WHERE aws.accountId IN ({}) AND {} {} SINCE '{}' UNTIL '{}' LIMIT MAX",
            METRIC_SELECT,
            self.upstream_account_ids.join(", "),
            GATEWAY_DIMENSIONS,
            FACETS,
            self.range.start,
            self.range.end,
        )
    }

    /// NerdGraph document wrapping the NRQL for the analytics account.
    pub fn graphql(&self) -> PulseResult<String> {
        // A JSON string literal is also a valid GraphQL string literal.
        let nrql = serde_json::to_string(&self.nrql())?;

        Ok(format!(
            "{{ actor {{ account(id: {}) {{ nrql(query: {}, timeout: {}) {{ results }} }} }} }}",
            self.analytics_account_id, nrql, self.timeout,
        ))
    }
}
