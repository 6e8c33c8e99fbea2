use crate::error::*;
use std::time::Duration;
use tracing::{error, info, warn};

pub trait ErrorExt {
    fn log_error(&self) -> &Self;
    fn log_warn(&self) -> &Self;
    fn is_retryable(&self) -> bool;
    fn retry_after(&self) -> Option<Duration>;
    fn user_friendly_message(&self) -> String;
    fn error_code(&self) -> String;
}

impl ErrorExt for CoreError {
    fn log_error(&self) -> &Self {
        error!("CoreError: {}", self);
        match self {
            CoreError::RedditApi(e) => {
                error!("Reddit API error details: {:?}", e);
            }
            CoreError::Persistence(e) => {
                error!("Persistence error details: {:?}", e);
            }
            CoreError::Classifier(e) => {
                error!("Classifier error details: {:?}", e);
            }
            CoreError::Embedding(e) => {
                error!("Embedding error details: {:?}", e);
            }
            CoreError::Index(e) => {
                error!("Index error details: {:?}", e);
            }
            CoreError::Config(e) => {
                error!("Configuration error details: {:?}", e);
            }
            _ => {}
        }
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("CoreError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        match self {
            CoreError::RedditApi(e) => e.is_retryable(),
            CoreError::Classifier(e) => e.is_retryable(),
            CoreError::Embedding(e) => e.is_retryable(),
            CoreError::Index(e) => e.is_retryable(),
            CoreError::Network(_) => true,
            CoreError::Timeout { .. } => true,
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            CoreError::RedditApi(e) => e.retry_after(),
            CoreError::Classifier(e) => e.retry_after(),
            CoreError::Timeout { seconds } => Some(Duration::from_secs(*seconds)),
            _ if self.is_retryable() => Some(Duration::from_secs(5)),
            _ => None,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            CoreError::InvalidReference { reference, .. } => format!(
                "'{}' is not a Reddit profile URL. Expected something like https://www.reddit.com/user/<name>/",
                reference
            ),
            CoreError::RedditApi(e) => e.user_friendly_message(),
            CoreError::UpstreamFetch { operation, .. } => format!(
                "Could not fetch {} from Reddit. Please try again later.",
                operation
            ),
            CoreError::Persistence(e) => e.user_friendly_message(),
            CoreError::Classifier(e) => e.user_friendly_message(),
            CoreError::Embedding(e) => e.user_friendly_message(),
            CoreError::Index(e) => e.user_friendly_message(),
            CoreError::Config(e) => e.user_friendly_message(),
            CoreError::Network(_) => {
                "Network connection error. Please check your internet connection.".to_string()
            }
            CoreError::Timeout { seconds } => format!(
                "The operation did not finish within {} seconds. Please try again.",
                seconds
            ),
            _ => "An unexpected error occurred. Please try again later.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            CoreError::InvalidReference { .. } => "INVALID_REFERENCE".to_string(),
            CoreError::RedditApi(_) => "REDDIT_API".to_string(),
            CoreError::UpstreamFetch { .. } => "UPSTREAM_FETCH".to_string(),
            CoreError::Persistence(_) => "PERSISTENCE".to_string(),
            CoreError::Classifier(_) => "CLASSIFIER".to_string(),
            CoreError::Embedding(_) => "EMBEDDING".to_string(),
            CoreError::Index(_) => "INDEX".to_string(),
            CoreError::Config(_) => "CONFIG".to_string(),
            CoreError::Io(_) => "IO".to_string(),
            CoreError::Serialization(_) => "SERIALIZATION".to_string(),
            CoreError::Network(_) => "NETWORK".to_string(),
            CoreError::Timeout { .. } => "TIMEOUT".to_string(),
            CoreError::Internal { .. } => "INTERNAL".to_string(),
        }
    }
}

impl ErrorExt for RedditApiError {
    fn log_error(&self) -> &Self {
        error!("RedditApiError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("RedditApiError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        match self {
            RedditApiError::RateLimitExceeded { .. } => true,
            RedditApiError::RequestTimeout => true,
            RedditApiError::ServerError { status_code } => *status_code >= 500,
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            RedditApiError::RateLimitExceeded { retry_after } => {
                Some(Duration::from_secs(*retry_after))
            }
            _ if self.is_retryable() => Some(Duration::from_secs(30)),
            _ => None,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            RedditApiError::AuthenticationFailed { .. } => {
                "Reddit authentication failed. Please check your credentials.".to_string()
            }
            RedditApiError::RateLimitExceeded { retry_after } => format!(
                "Too many requests. Please wait {} seconds before trying again.",
                retry_after
            ),
            RedditApiError::Forbidden { resource } => format!(
                "Access denied to {}. The content may be private, banned or quarantined.",
                resource
            ),
            RedditApiError::SubredditNotFound { subreddit } => {
                format!("Subreddit '{}' not found or is private.", subreddit)
            }
            RedditApiError::UserNotFound { username } => {
                format!("Reddit user '{}' does not exist or is suspended.", username)
            }
            RedditApiError::InvalidToken => {
                "Reddit authentication token is invalid. Please re-authenticate.".to_string()
            }
            RedditApiError::RequestTimeout => {
                "Request to Reddit timed out. Please try again.".to_string()
            }
            _ => "Reddit API error occurred. Please try again later.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            RedditApiError::AuthenticationFailed { .. } => "REDDIT_AUTH_FAILED".to_string(),
            RedditApiError::RateLimitExceeded { .. } => "REDDIT_RATE_LIMIT".to_string(),
            RedditApiError::Forbidden { .. } => "REDDIT_FORBIDDEN".to_string(),
            RedditApiError::SubredditNotFound { .. } => "REDDIT_SUBREDDIT_NOT_FOUND".to_string(),
            RedditApiError::UserNotFound { .. } => "REDDIT_USER_NOT_FOUND".to_string(),
            RedditApiError::NotFound { .. } => "REDDIT_NOT_FOUND".to_string(),
            RedditApiError::InvalidToken => "REDDIT_INVALID_TOKEN".to_string(),
            RedditApiError::RequestTimeout => "REDDIT_TIMEOUT".to_string(),
            RedditApiError::InvalidResponse { .. } => "REDDIT_INVALID_RESPONSE".to_string(),
            RedditApiError::ServerError { .. } => "REDDIT_SERVER_ERROR".to_string(),
        }
    }
}

impl ErrorExt for PersistenceError {
    fn log_error(&self) -> &Self {
        error!("PersistenceError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("PersistenceError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        false
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }

    fn user_friendly_message(&self) -> String {
        match self {
            PersistenceError::CreateDirectory { path, .. } => format!(
                "Could not create the output directory '{}'. Please check permissions.",
                path
            ),
            PersistenceError::Write { path, .. } => format!(
                "Could not save '{}'. Check free disk space and permissions.",
                path
            ),
            PersistenceError::Read { path, .. } => format!("Could not open '{}'.", path),
            PersistenceError::Serialize { .. } => {
                "The export could not be encoded. This is a bug.".to_string()
            }
            PersistenceError::Deserialize { path, .. } => {
                format!("'{}' is not a valid export document.", path)
            }
        }
    }

    fn error_code(&self) -> String {
        match self {
            PersistenceError::CreateDirectory { .. } => "PERSIST_CREATE_DIR".to_string(),
            PersistenceError::Write { .. } => "PERSIST_WRITE".to_string(),
            PersistenceError::Read { .. } => "PERSIST_READ".to_string(),
            PersistenceError::Serialize { .. } => "PERSIST_SERIALIZE".to_string(),
            PersistenceError::Deserialize { .. } => "PERSIST_DESERIALIZE".to_string(),
        }
    }
}

impl ErrorExt for ClassifierError {
    fn log_error(&self) -> &Self {
        error!("ClassifierError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("ClassifierError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClassifierError::RateLimitExceeded { .. }
                | ClassifierError::ModelLoading { .. }
                | ClassifierError::ServiceUnavailable { .. }
                | ClassifierError::RequestTimeout { .. }
        )
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            ClassifierError::RateLimitExceeded { retry_after, .. } => {
                Some(Duration::from_secs(*retry_after))
            }
            ClassifierError::ModelLoading { estimated_secs, .. } => {
                Some(Duration::from_secs(*estimated_secs))
            }
            _ if self.is_retryable() => Some(Duration::from_secs(10)),
            _ => None,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ClassifierError::InvalidApiKey { provider } => format!(
                "Invalid API token for {}. Please update your credentials.",
                provider
            ),
            ClassifierError::RateLimitExceeded {
                provider,
                retry_after,
            } => format!(
                "Rate limit exceeded for {}. Please wait {} seconds.",
                provider, retry_after
            ),
            ClassifierError::ModelNotAvailable { model } => {
                format!("Model '{}' is not available.", model)
            }
            ClassifierError::ModelLoading { model, .. } => {
                format!("Model '{}' is still loading. Please try again shortly.", model)
            }
            ClassifierError::ServiceUnavailable { provider } => format!(
                "{} service is temporarily unavailable. Please try again later.",
                provider
            ),
            ClassifierError::Unavailable { reason } => {
                format!("Model analysis was skipped: {}", reason)
            }
            _ => "Model inference error occurred. Please try again later.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            ClassifierError::InvalidApiKey { .. } => "CLASSIFIER_INVALID_API_KEY".to_string(),
            ClassifierError::RateLimitExceeded { .. } => "CLASSIFIER_RATE_LIMIT".to_string(),
            ClassifierError::ModelNotAvailable { .. } => {
                "CLASSIFIER_MODEL_NOT_AVAILABLE".to_string()
            }
            ClassifierError::ModelLoading { .. } => "CLASSIFIER_MODEL_LOADING".to_string(),
            ClassifierError::ServiceUnavailable { .. } => {
                "CLASSIFIER_SERVICE_UNAVAILABLE".to_string()
            }
            ClassifierError::RequestTimeout { .. } => "CLASSIFIER_TIMEOUT".to_string(),
            ClassifierError::InferenceFailed { .. } => "CLASSIFIER_INFERENCE_FAILED".to_string(),
            ClassifierError::InvalidResponseFormat { .. } => {
                "CLASSIFIER_INVALID_RESPONSE".to_string()
            }
            ClassifierError::Unavailable { .. } => "CLASSIFIER_UNAVAILABLE".to_string(),
        }
    }
}

impl ErrorExt for EmbeddingError {
    fn log_error(&self) -> &Self {
        error!("EmbeddingError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("EmbeddingError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            EmbeddingError::ServiceUnavailable { .. } | EmbeddingError::InferenceFailed { .. }
        )
    }

    fn retry_after(&self) -> Option<Duration> {
        if self.is_retryable() {
            Some(Duration::from_secs(2))
        } else {
            None
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            EmbeddingError::ModelNotFound { model_name } => format!(
                "Embedding model '{}' not found. Please download it first.",
                model_name
            ),
            EmbeddingError::ModelLoadingFailed { .. } => {
                "Failed to load embedding model. Please try again.".to_string()
            }
            EmbeddingError::DimensionMismatch { expected, actual } => format!(
                "Embedding size changed ({} vs {}). Rebuild the index with one model.",
                expected, actual
            ),
            _ => "Embedding processing error occurred. Please try again.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            EmbeddingError::ModelLoadingFailed { .. } => "EMBED_MODEL_LOAD_FAILED".to_string(),
            EmbeddingError::ModelNotFound { .. } => "EMBED_MODEL_NOT_FOUND".to_string(),
            EmbeddingError::TokenizationFailed { .. } => "EMBED_TOKENIZATION_FAILED".to_string(),
            EmbeddingError::InferenceFailed { .. } => "EMBED_INFERENCE_FAILED".to_string(),
            EmbeddingError::ServiceUnavailable { .. } => "EMBED_SERVICE_UNAVAILABLE".to_string(),
            EmbeddingError::DimensionMismatch { .. } => "EMBED_DIMENSION_MISMATCH".to_string(),
        }
    }
}

impl ErrorExt for IndexError {
    fn log_error(&self) -> &Self {
        error!("IndexError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("IndexError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            IndexError::IndexLocked | IndexError::ConnectionFailed { .. }
        )
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            IndexError::IndexLocked => Some(Duration::from_millis(100)),
            _ if self.is_retryable() => Some(Duration::from_secs(1)),
            _ => None,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            IndexError::ConnectionFailed { .. } => {
                "Could not open the retrieval index. Please check the database path.".to_string()
            }
            IndexError::IndexLocked => {
                "The retrieval index is busy. Please try again.".to_string()
            }
            IndexError::CorruptEntry { id, .. } => {
                format!("Index entry '{}' is corrupt. Re-index the export.", id)
            }
            _ => "Retrieval index error occurred. Please try again.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            IndexError::ConnectionFailed { .. } => "INDEX_CONNECTION_FAILED".to_string(),
            IndexError::MigrationFailed { .. } => "INDEX_MIGRATION_FAILED".to_string(),
            IndexError::CorruptEntry { .. } => "INDEX_CORRUPT_ENTRY".to_string(),
            IndexError::IndexLocked => "INDEX_LOCKED".to_string(),
            IndexError::Sql(_) => "INDEX_SQL_ERROR".to_string(),
        }
    }
}

impl ErrorExt for ConfigError {
    fn log_error(&self) -> &Self {
        error!("ConfigError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("ConfigError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        false
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ConfigError::FileNotFound { path } => {
                format!("Configuration file '{}' not found.", path)
            }
            ConfigError::MissingField { field } => {
                format!("Required configuration field '{}' is missing.", field)
            }
            ConfigError::InvalidValue { field, .. } => {
                format!("Invalid value for configuration field '{}'.", field)
            }
            ConfigError::PermissionDenied { .. } => {
                "Permission denied accessing configuration. Please check file permissions."
                    .to_string()
            }
            ConfigError::Parse(_) => {
                "Configuration file format is invalid. Please check the settings.".to_string()
            }
        }
    }

    fn error_code(&self) -> String {
        match self {
            ConfigError::FileNotFound { .. } => "CONFIG_FILE_NOT_FOUND".to_string(),
            ConfigError::MissingField { .. } => "CONFIG_MISSING_FIELD".to_string(),
            ConfigError::InvalidValue { .. } => "CONFIG_INVALID_VALUE".to_string(),
            ConfigError::PermissionDenied { .. } => "CONFIG_PERMISSION_DENIED".to_string(),
            ConfigError::Parse(_) => "CONFIG_PARSE_ERROR".to_string(),
        }
    }
}

/// Logs failures at the process boundary.
#[derive(Debug, Default)]
pub struct ErrorReporter;

impl ErrorReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn report_error(&self, error: &CoreError) {
        error.log_error();
        info!("Error code: {}", error.error_code());
        info!("User message: {}", error.user_friendly_message());
        if error.is_retryable() {
            if let Some(retry_after) = error.retry_after() {
                info!("Error is retryable. Retry after: {:?}", retry_after);
            }
        }
    }

    pub fn report_stage_error(&self, error: &StageError) {
        error!("Pipeline aborted in {} stage", error.stage);
        self.report_error(&error.source);
    }

    /// For failures the pipeline continues past.
    pub fn report_warning(&self, error: &CoreError) {
        error.log_warn();
    }
}
