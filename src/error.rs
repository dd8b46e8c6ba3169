use thiserror::Error;

#[derive(Error, Debug)]
pub enum PulseError {
    #[error("New Relic API error: {status} - {body}")]
    Fetch { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("GraphQL errors: {detail}")]
    Query { detail: String },

    #[error("No results found")]
    NoResults,

    #[error("Malformed result row: expected at least 3 facet values, got {facet:?}")]
    MalformedRow { facet: Vec<String> },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },
}

pub type PulseResult<T> = Result<T, PulseError>;
