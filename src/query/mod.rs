pub mod date_range;
pub mod nrql;

pub use date_range::DateRange;
pub use nrql::GatewayMetricsQuery;
