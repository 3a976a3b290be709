//! HTTP transport shared by the catalog walker, the resource streamer and the
//! collection store client
//!
//! - `config`: HTTP client configuration and building
//! - `http`: Core HTTP operations with rate limiting and retries

pub mod config;
pub mod http;

pub use config::ClientConfig;
pub use http::{parse_url, HttpHandler};
