//! Error types for giftwise.

use std::time::Duration;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Scrape job errors.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Invalid handle {handle:?}: {reason}")]
    InvalidHandle { handle: String, reason: String },

    #[error("Scraping is disabled (no APIFY_TOKEN configured)")]
    Disabled,

    #[error("Actor {actor} request failed: {reason}")]
    RequestFailed { actor: String, reason: String },

    #[error("Invalid response from actor {actor}: {reason}")]
    InvalidResponse { actor: String, reason: String },
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Affiliate API errors.
#[derive(Debug, thiserror::Error)]
pub enum RetailerError {
    #[error("Retailer {retailer} request failed: {reason}")]
    RequestFailed { retailer: String, reason: String },

    #[error("Retailer {retailer} returned HTTP {status}")]
    Status { retailer: String, status: u16 },

    #[error("Invalid response from retailer {retailer}: {reason}")]
    InvalidResponse { retailer: String, reason: String },
}

/// Recommendation pipeline errors.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Session {0} not found")]
    SessionNotFound(String),

    #[error("No social data or description available for {recipient}")]
    NoSignal { recipient: String },

    #[error("No candidate products found")]
    NoCandidates,

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}
