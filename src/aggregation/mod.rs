use crate::ServiceRow;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

/// Rolling statistics for one service over the query window.
///
/// A summary only comes into existence by folding a row, so `number_of_days`
/// is always at least one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSummary {
    pub account_id: String,
    pub total_requests: f64,
    #[serde(rename = "total5xx")]
    pub total_5xx: f64,
    pub number_of_days: u32,
    pub query_dates: Vec<String>,
    pub total_success_percentage: f64,
    pub success_percentage: f64,
}

impl ServiceSummary {
    fn from_row(row: &ServiceRow) -> Self {
        let mut summary = Self {
            account_id: row.facet.account_id.clone(),
            total_requests: 0.0,
            total_5xx: 0.0,
            number_of_days: 0,
            query_dates: Vec::new(),
            total_success_percentage: 0.0,
            success_percentage: 0.0,
        };
        summary.fold(row);
        summary
    }

    // Duplicate day buckets are folded too; number_of_days counts rows.
    fn fold(&mut self, row: &ServiceRow) {
        self.total_requests += row.total_requests;
        self.total_5xx += row.total_5xx;
        self.total_success_percentage += row.success_percentage;
        self.number_of_days += 1;
        self.query_dates.push(row.facet.date.clone());
    }

    fn finalize(&mut self) {
        self.success_percentage = self.total_success_percentage / f64::from(self.number_of_days);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsResponse {
    pub total_results: usize,
    pub data: BTreeMap<String, ServiceSummary>,
    #[serde(serialize_with = "serialize_query_time")]
    pub query_time: DateTime<Utc>,
}

// ISO-8601 with millisecond precision and a `Z` suffix.
fn serialize_query_time<S: Serializer>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&time.to_rfc3339_opts(SecondsFormat::Millis, true))
}

pub fn filter_known<'a>(rows: &'a [ServiceRow], known_service_ids: &HashSet<String>) -> Vec<&'a ServiceRow> {
    rows.iter()
        .filter(|row| row.facet.contains_any(known_service_ids))
        .collect()
}

pub fn aggregate(rows: &[ServiceRow], known_service_ids: &HashSet<String>) -> BTreeMap<String, ServiceSummary> {
    fold_rows(filter_known(rows, known_service_ids))
}

fn fold_rows(rows: Vec<&ServiceRow>) -> BTreeMap<String, ServiceSummary> {
    let mut grouped: BTreeMap<String, ServiceSummary> = BTreeMap::new();

    for row in rows {
        let service_id = &row.facet.service_id;
        if service_id.is_empty() {
            warn!("No service id found in facet: {:?}", row.facet.values().collect::<Vec<_>>());
            continue;
        }

        debug!(
            "Processing result for {}: requests={} 5xx={} success={}",
            service_id, row.total_requests, row.total_5xx, row.success_percentage
        );

        match grouped.entry(service_id.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(ServiceSummary::from_row(row));
            }
            Entry::Occupied(mut slot) => slot.get_mut().fold(row),
        }
    }

    for summary in grouped.values_mut() {
        summary.finalize();
    }

    grouped
}

/// Filters, groups and averages `rows`, stamping the result with `query_time`.
pub fn summarize_at(
    rows: &[ServiceRow],
    known_service_ids: &HashSet<String>,
    query_time: DateTime<Utc>,
) -> MetricsResponse {
    summarize_with(rows, known_service_ids, || query_time)
}

/// Like [`summarize_at`], stamped with the instant aggregation completed.
pub fn summarize(rows: &[ServiceRow], known_service_ids: &HashSet<String>) -> MetricsResponse {
    summarize_with(rows, known_service_ids, Utc::now)
}

fn summarize_with<F>(rows: &[ServiceRow], known_service_ids: &HashSet<String>, clock: F) -> MetricsResponse
where
    F: FnOnce() -> DateTime<Utc>,
{
    let known = filter_known(rows, known_service_ids);

    info!("Filtered results: {} of {}", known.len(), rows.len());
    let found: Vec<&str> = known
        .iter()
        .flat_map(|row| row.facet.values().filter(|v| known_service_ids.contains(*v)))
        .collect();
    debug!("Allow-listed services found: {:?}", found);

    let total_results = known.len();
    let data = fold_rows(known);

    MetricsResponse {
        total_results,
        data,
        query_time: clock(),
    }
}
