//! Utility modules supporting the client.
//!
//! - [`HttpClient`]: reqwest-backed transport
//! - [`RequestSpacing`]: shared minimum spacing between outgoing requests
//! - [`RetryConfig`] and [`with_retry`]: capped exponential backoff for transient failures
//! - [`write_atomic`]: scoped, atomic file writes for downloads
//!
//! # Retry with Backoff
//!
//! ```rust,no_run
//! use pubchem_client::client::PubChemError;
//! use pubchem_client::utils::{with_retry, RetryConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn fetch_data() -> Result<String, PubChemError> { Ok("data".to_string()) }
//! # #[tokio::main]
//! # async fn main() -> Result<(), PubChemError> {
//! let cancel = CancellationToken::new();
//! let result = with_retry(&RetryConfig::default(), &cancel, || fetch_data()).await?;
//! # Ok(())
//! # }
//! ```

mod download;
mod http;
mod rate_limit;
mod retry;

pub use download::{check_destination, save, write_atomic};
pub use http::HttpClient;
pub use rate_limit::RequestSpacing;
pub use retry::{sleep_or_cancel, with_retry, RetryConfig, TransientError};
