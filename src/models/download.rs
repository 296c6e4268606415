//! Requests and results for saving raw responses to disk.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::query::OutputFormat;

/// Request for saving a query's response to a file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadRequest {
    /// Format requested from the service
    pub format: OutputFormat,

    /// Where to save the payload
    pub path: PathBuf,

    /// Replace an existing file instead of failing
    pub overwrite: bool,
}

impl DownloadRequest {
    pub fn new(format: OutputFormat, path: impl Into<PathBuf>) -> Self {
        Self {
            format,
            path: path.into(),
            overwrite: false,
        }
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

/// Result of a download operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadResult {
    /// Path where the file was saved
    pub path: PathBuf,

    /// Number of bytes written
    pub bytes: u64,
}
