use crate::error::{PulseError, PulseResult};
use crate::{Facet, ServiceRow};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct GraphQlRequest {
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct GraphQlResponse {
    #[serde(default)]
    pub data: Option<ResponseData>,
    #[serde(default)]
    pub errors: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseData {
    #[serde(default)]
    pub actor: Option<Actor>,
}

#[derive(Debug, Deserialize)]
pub struct Actor {
    #[serde(default)]
    pub account: Option<Account>,
}

#[derive(Debug, Deserialize)]
pub struct Account {
    #[serde(default)]
    pub nrql: Option<NrqlResult>,
}

#[derive(Debug, Deserialize)]
pub struct NrqlResult {
    #[serde(default)]
    pub results: Option<Vec<RawResultRow>>,
}

impl GraphQlResponse {
    pub fn into_results(self) -> PulseResult<Vec<RawResultRow>> {
        if let Some(errors) = self.errors {
            return Err(PulseError::Query {
                detail: errors.to_string(),
            });
        }

        let results = self
            .data
            .and_then(|data| data.actor)
            .and_then(|actor| actor.account)
            .and_then(|account| account.nrql)
            .and_then(|nrql| nrql.results)
            .unwrap_or_default();

        if results.is_empty() {
            return Err(PulseError::NoResults);
        }

        Ok(results)
    }
}

/// NRQL returns a bare string instead of an array when a query has one facet,
/// and `null` for a facet attribute the event did not carry.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawFacet {
    Many(Vec<Option<String>>),
    One(Option<String>),
}

impl Default for RawFacet {
    fn default() -> Self {
        RawFacet::Many(Vec::new())
    }
}

// Missing facet values become empty strings so the row reaches the empty-id skip.
impl From<RawFacet> for Vec<String> {
    fn from(facet: RawFacet) -> Self {
        match facet {
            RawFacet::Many(values) => values.into_iter().map(Option::unwrap_or_default).collect(),
            RawFacet::One(Some(value)) => vec![value],
            RawFacet::One(None) => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawResultRow {
    #[serde(default)]
    pub facet: RawFacet,
    #[serde(default)]
    pub total_requests: Option<f64>,
    #[serde(default, rename = "total5xx")]
    pub total_5xx: Option<f64>,
    #[serde(default)]
    pub success_percentage: Option<f64>,
    #[serde(default)]
    pub latency: Option<f64>,
    #[serde(default)]
    pub integration_latency: Option<f64>,
    #[serde(default)]
    pub latency_count: Option<f64>,
}

impl TryFrom<RawResultRow> for ServiceRow {
    type Error = PulseError;

    fn try_from(raw: RawResultRow) -> PulseResult<Self> {
        let facet = Facet::from_values(raw.facet.into())?;

        Ok(ServiceRow {
            facet,
            total_requests: raw.total_requests.unwrap_or_default(),
            total_5xx: raw.total_5xx.unwrap_or_default(),
            success_percentage: raw.success_percentage.unwrap_or_default(),
            latency: raw.latency.unwrap_or_default(),
            integration_latency: raw.integration_latency.unwrap_or_default(),
            latency_count: raw.latency_count.unwrap_or_default(),
        })
    }
}

pub fn decode_rows(raw: Vec<RawResultRow>) -> PulseResult<Vec<ServiceRow>> {
    raw.into_iter().map(ServiceRow::try_from).collect()
}
