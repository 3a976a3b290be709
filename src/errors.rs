//! Error types for the catalog loader
//!
//! Each fetch site gets its own error domain so that callers can tell a fatal
//! manifest failure apart from a per-dataset store failure or a per-stream
//! parse failure. Transport failures (including cancellation and deadline
//! expiry) share one type, [`FetchError`], wherever they surface.

use std::path::PathBuf;
use thiserror::Error;

/// Transport-level failures shared by every HTTP fetch site
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// Invalid URL provided
    #[error("Invalid URL: {url} - {error}")]
    InvalidUrl { url: String, error: String },

    /// Rate limit exceeded after retries
    #[error("Rate limit exceeded. Server responded with HTTP 429")]
    RateLimitExceeded,

    /// Server overloaded after retries
    #[error("Server overloaded. Server responded with HTTP 503")]
    ServerOverloaded,

    /// Maximum retries exceeded
    #[error("Maximum retry attempts ({max_retries}) exceeded: {source}")]
    MaxRetriesExceeded {
        max_retries: u32,
        #[source]
        source: reqwest::Error,
    },

    /// The run was cancelled while the request was in flight
    #[error("Request cancelled by shutdown signal")]
    Cancelled,

    /// The run deadline expired while the request was in flight
    #[error("Run deadline exceeded")]
    DeadlineExceeded,
}

impl FetchError {
    /// HTTP status code carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            FetchError::Http(e) => e.status().map(|s| s.as_u16()),
            FetchError::RateLimitExceeded => Some(429),
            FetchError::ServerOverloaded => Some(503),
            _ => None,
        }
    }

    /// Whether the failure came from cancellation or deadline expiry
    pub fn is_interrupt(&self) -> bool {
        matches!(self, FetchError::Cancelled | FetchError::DeadlineExceeded)
    }
}

/// Catalog manifest errors; always fatal to the run
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Manifest could not be fetched
    #[error("Fetch catalog failed: {0}")]
    Fetch(#[from] FetchError),

    /// Manifest body is not a valid catalog document
    #[error("Catalog manifest is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Collection store errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// Transport failure talking to the store
    #[error(transparent)]
    Transport(#[from] FetchError),

    /// Store rejected the request
    #[error("Collection store returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// Store response could not be decoded
    #[error("Could not decode collection store response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Store response carried no usable collection identifier
    #[error("Collection store response is missing a collection id")]
    MissingCollectionId,

    /// No API host or key configured
    #[error(
        "Missing collection store settings. Set ALEPHCLIENT_HOST and ALEPHCLIENT_API_KEY or fill the [store] config table"
    )]
    MissingCredentials,

    /// Generic store failure
    #[error("{0}")]
    Other(String),
}

/// Failure reconciling one dataset; never aborts the walk by itself
#[derive(Error, Debug)]
#[error("Reconciling dataset {foreign_id} failed: {source}")]
pub struct ReconcileError {
    /// Foreign identifier of the dataset whose reconciliation failed
    pub foreign_id: String,
    /// Underlying store failure
    #[source]
    pub source: StoreError,
}

/// Resource stream errors
#[derive(Error, Debug)]
pub enum ResourceError {
    /// Transport failure while reading the body
    #[error(transparent)]
    Transport(#[from] FetchError),

    /// A line in the body is not valid JSON
    #[error("Invalid JSON on line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// A line grew past the length limit without a newline
    #[error("Line {line} exceeds {limit} bytes without a newline")]
    LineTooLong { line: usize, limit: usize },
}

/// Entity ingestion errors
#[derive(Error, Debug)]
pub enum IngestError {
    /// Reading the record stream failed
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// Writing entities to the store failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Invalid configuration format
    #[error("Invalid configuration format: {0}")]
    InvalidFormat(#[from] toml::de::Error),

    /// Configuration could not be serialized
    #[error("Could not serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Missing required configuration field
    #[error("Missing required configuration field: {field}")]
    MissingField { field: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    /// Configuration file I/O failed
    #[error("Configuration file I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Transport error
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Catalog manifest error
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Collection store error
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Dataset reconciliation error
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    /// Resource stream error
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// Entity ingestion error
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Check if the error is recoverable (transient)
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::Fetch(e)
            | AppError::Catalog(CatalogError::Fetch(e))
            | AppError::Store(StoreError::Transport(e))
            | AppError::Resource(ResourceError::Transport(e)) => fetch_is_transient(e),
            AppError::Reconcile(ReconcileError {
                source: StoreError::Transport(e),
                ..
            }) => fetch_is_transient(e),
            _ => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Fetch(_) => "transport",
            AppError::Catalog(_) => "catalog",
            AppError::Store(_) => "store",
            AppError::Reconcile(_) => "reconcile",
            AppError::Resource(_) => "resource",
            AppError::Ingest(_) => "ingest",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

fn fetch_is_transient(error: &FetchError) -> bool {
    match error {
        FetchError::Http(_)
        | FetchError::RateLimitExceeded
        | FetchError::ServerOverloaded
        | FetchError::DeadlineExceeded => true,
        FetchError::Status { status, .. } => *status >= 500,
        _ => false,
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Transport result type alias
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Catalog result type alias
pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

/// Store result type alias
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Resource stream result type alias
pub type ResourceResult<T> = std::result::Result<T, ResourceError>;

/// Ingestion result type alias
pub type IngestResult<T> = std::result::Result<T, IngestError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_status() {
        let err = FetchError::Status {
            status: 404,
            url: "http://example.org/a".to_string(),
        };
        assert_eq!(err.status(), Some(404));
        assert_eq!(FetchError::Cancelled.status(), None);
        assert!(FetchError::Cancelled.is_interrupt());
        assert!(FetchError::DeadlineExceeded.is_interrupt());
        assert!(!FetchError::RateLimitExceeded.is_interrupt());
    }

    #[test]
    fn test_error_categories() {
        let err = AppError::from(CatalogError::Fetch(FetchError::Cancelled));
        assert_eq!(err.category(), "catalog");
        assert!(!err.is_recoverable());

        let err = AppError::from(ReconcileError {
            foreign_id: "ds-a".to_string(),
            source: StoreError::Transport(FetchError::ServerOverloaded),
        });
        assert_eq!(err.category(), "reconcile");
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("ds-a"));
    }

    #[test]
    fn test_parse_error_is_not_recoverable() {
        let source = serde_json::from_str::<serde_json::Value>("{nope").unwrap_err();
        let err = AppError::from(ResourceError::Parse { line: 3, source });
        assert_eq!(err.category(), "resource");
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("line 3"));
    }
}
