use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid profile reference '{reference}': {reason}")]
    InvalidReference { reference: String, reason: String },

    #[error("Reddit API error: {0}")]
    RedditApi(#[from] RedditApiError),

    #[error("Upstream fetch failed for {operation} after {attempts} attempt(s): {message}")]
    UpstreamFetch {
        operation: String,
        attempts: u32,
        message: String,
    },

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Classifier error: {0}")]
    Classifier(#[from] ClassifierError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Operation timeout after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

#[derive(Error, Debug, Clone)]
pub enum RedditApiError {
    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    #[error("Rate limit exceeded. Retry after {retry_after} seconds")]
    RateLimitExceeded { retry_after: u64 },

    #[error("Forbidden access to resource: {resource}")]
    Forbidden { resource: String },

    #[error("Subreddit not found: {subreddit}")]
    SubredditNotFound { subreddit: String },

    #[error("User not found: {username}")]
    UserNotFound { username: String },

    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    #[error("Invalid OAuth token")]
    InvalidToken,

    #[error("Request timeout")]
    RequestTimeout,

    #[error("Invalid API response: {details}")]
    InvalidResponse { details: String },

    #[error("Server error: {status_code}")]
    ServerError { status_code: u16 },
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Cannot create output directory {path}: {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot encode document for {path}: {source}")]
    Serialize {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Malformed export document {path}: {source}")]
    Deserialize {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("API token invalid or missing for {provider}")]
    InvalidApiKey { provider: String },

    #[error("Rate limit exceeded for {provider}. Retry after {retry_after} seconds")]
    RateLimitExceeded { provider: String, retry_after: u64 },

    #[error("Model not available: {model}")]
    ModelNotAvailable { model: String },

    #[error("Model {model} is loading (estimated {estimated_secs}s)")]
    ModelLoading { model: String, estimated_secs: u64 },

    #[error("Provider service unavailable: {provider}")]
    ServiceUnavailable { provider: String },

    #[error("Request timeout for {provider}")]
    RequestTimeout { provider: String },

    #[error("Inference failed for {model}: {reason}")]
    InferenceFailed { model: String, reason: String },

    #[error("Invalid response format from {model}: {details}")]
    InvalidResponseFormat { model: String, details: String },

    #[error("Classifier unavailable: {reason}")]
    Unavailable { reason: String },
}

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Model loading failed: {model_path}")]
    ModelLoadingFailed { model_path: String },

    #[error("Model not found: {model_name}")]
    ModelNotFound { model_name: String },

    #[error("Tokenization failed: {text_length} characters")]
    TokenizationFailed { text_length: usize },

    #[error("Model inference failed: {reason}")]
    InferenceFailed { reason: String },

    #[error("Embedding service unavailable: {provider}")]
    ServiceUnavailable { provider: String },

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Connection failed: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Migration failed: {migration}")]
    MigrationFailed { migration: String },

    #[error("Corrupt index entry {id}: {reason}")]
    CorruptEntry { id: String, reason: String },

    #[error("Index locked")]
    IndexLocked,

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Permission denied accessing config: {path}")]
    PermissionDenied { path: String },

    #[error("Configuration parsing error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Pipeline stage a fatal error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Resolve,
    Aggregate,
    Normalize,
    Persist,
    Analyze,
    Index,
    Query,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Resolve => "resolve",
            Stage::Aggregate => "aggregate",
            Stage::Normalize => "normalize",
            Stage::Persist => "persist",
            Stage::Analyze => "analyze",
            Stage::Index => "index",
            Stage::Query => "query",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
#[error("{stage} stage failed: {source}")]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub source: CoreError,
}

pub trait StageExt<T> {
    fn at_stage(self, stage: Stage) -> Result<T, StageError>;
}

impl<T, E> StageExt<T> for Result<T, E>
where
    E: Into<CoreError>,
{
    fn at_stage(self, stage: Stage) -> Result<T, StageError> {
        self.map_err(|e| StageError {
            stage,
            source: e.into(),
        })
    }
}
