//! Application constants for the catalog loader
//!
//! This module centralizes all constants used throughout the application,
//! organized by functional domain.

use std::time::Duration;

/// Environment variable names for the collection store
pub mod env {
    /// Base URL of the collection store API
    pub const HOST: &str = "ALEPHCLIENT_HOST";

    /// API key for the collection store
    pub const API_KEY: &str = "ALEPHCLIENT_API_KEY";
}

/// HTTP client configuration constants
pub mod http {
    use super::Duration;

    /// Default user agent for all HTTP requests
    pub const USER_AGENT: &str = concat!("catalog-loader/", env!("CARGO_PKG_VERSION"));

    /// Total timeout for manifest and store requests
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    /// Total timeout for a resource stream, body read included
    pub const STREAM_TIMEOUT: Duration = Duration::from_secs(60 * 60);

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Connection pool idle timeout
    pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

    /// Maximum idle connections per host in pool
    pub const POOL_MAX_PER_HOST: usize = 8;
}

/// Rate limiting and retry configuration for the transport
pub mod limits {
    /// Default rate limit (requests per second)
    pub const DEFAULT_RATE_LIMIT_RPS: u32 = 20;

    /// Maximum retry attempts for failed requests
    pub const MAX_RETRIES: u32 = 3;

    /// Base delay for exponential backoff (milliseconds)
    pub const RETRY_BASE_DELAY_MS: u64 = 500;
}

/// Catalog and resource format constants
pub mod catalog {
    /// Content type of streamable structured-entity resources
    pub const ENTITY_MIME_TYPE: &str = "application/json+ftm";

    /// Node `type` value marking a pure grouping node
    pub const GROUP_NODE_TYPE: &str = "collection";

    /// Category assigned to newly created collections without one
    pub const DEFAULT_CATEGORY: &str = "other";

    /// Records between progress events on a resource stream
    pub const PROGRESS_INTERVAL: usize = 1000;

    /// Longest line a resource stream buffers before giving up on it
    pub const MAX_LINE_BYTES: usize = 16 * 1024 * 1024;
}

/// Collection store API constants
pub mod store {
    /// API path prefix
    pub const API_PREFIX: &str = "api/2/";

    /// Authorization scheme for API keys
    pub const AUTH_SCHEME: &str = "ApiKey";

    /// Entities per bulk write
    pub const DEFAULT_BULK_CHUNK_SIZE: usize = 1000;
}

/// Configuration file locations
pub mod config {
    /// Project-local configuration file name
    pub const LOCAL_FILE_NAME: &str = "catalog-loader.toml";

    /// Directory under the user config dir
    pub const APP_DIR_NAME: &str = "catalog-loader";

    /// Configuration file name inside the user config dir
    pub const FILE_NAME: &str = "config.toml";
}

// Re-export commonly used constants for convenience
pub use catalog::ENTITY_MIME_TYPE;
pub use env::{API_KEY as ENV_API_KEY, HOST as ENV_HOST};
pub use http::USER_AGENT;
pub use limits::DEFAULT_RATE_LIMIT_RPS;
