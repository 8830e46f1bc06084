use thiserror::Error;

/// Failures surfaced by an analysis session.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("no contract source provided")]
    EmptyInput,
    #[error("analysis service returned {status}: {body}")]
    Service { status: u16, body: String },
    #[error("failed to reach analysis service at {endpoint}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("analysis service sent an unreadable response: {0}")]
    InvalidResponse(String),
}

/// Invalid service configuration values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SettingsError {
    #[error("`{key}` must not be blank")]
    BlankEndpoint { key: String },
    #[error("`{key}` must be an http(s) URL (got `{value}`)")]
    InvalidEndpoint { key: String, value: String },
    #[error("`{key}` is not a valid duration (got `{value}`, e.g. `30s`)")]
    InvalidTimeout { key: String, value: String },
    #[error("`{key}` must be a non-negative integer (got `{value}`)")]
    InvalidRetries { key: String, value: String },
}
