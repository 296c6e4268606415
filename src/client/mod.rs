//! PUG REST protocol machinery.
//!
//! A [`Query`](crate::models::Query) travels through this module in stages:
//!
//! - [`build_request`] turns it into a [`ProtocolRequest`] without any I/O
//! - a [`Transport`] executes the request
//! - [`classify`] maps failures onto [`ErrorKind`]
//! - the list-key poller drives asynchronous jobs to completion
//! - [`ResultSet`] decodes the payload into records
//!
//! [`PubChemClient`] ties the stages together for each public operation.

mod classify;
mod listkey;
pub mod mock;
mod pubchem;
mod request;
mod response;

pub use classify::{classify, ServerFault};
pub use listkey::{JobOutcome, JobReport, JobState, PollConfig};
pub use pubchem::{PubChemClient, QueryOutput};
pub use request::{
    build_listkey_request, build_request, build_sources_request, PageWindow, ProtocolRequest,
};
pub use response::{check_format, Envelope, IdKind, ResultSet, ResultShape};

use async_trait::async_trait;
use http::{HeaderMap, Method, StatusCode};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

use crate::models::RecordError;

/// Closed set of failure classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    BadRequest,
    NotFound,
    MethodNotAllowed,
    Timeout,
    ServerBusy,
    Unimplemented,
    ServerError,
    ResponseParseError,
    PreconditionError,
}

impl ErrorKind {
    /// Whether a retry may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ErrorKind::Timeout | ErrorKind::ServerBusy | ErrorKind::ServerError
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Errors raised below the HTTP layer
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Network error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Other(err.to_string())
        }
    }
}

/// Errors that can occur when talking to PubChem
#[derive(Debug, thiserror::Error)]
pub enum PubChemError {
    /// Invalid arguments caught before any request was sent
    #[error("Invalid query: {0}")]
    Precondition(String),

    /// HTTP or protocol-level fault reported by the service
    #[error("{0}")]
    Server(ServerFault),

    /// Payload did not match the declared format or container
    #[error("Parse error: {0}")]
    ResponseParse(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The job was still running when the polling budget ran out
    #[error("List key {list_key} not ready after {waited:?}")]
    PollTimeout { list_key: String, waited: Duration },

    /// The service no longer knows the list key
    #[error("List key {list_key} expired")]
    ListKeyExpired { list_key: String },

    #[error("List key {list_key} failed: {source}")]
    ListKeyFailed {
        list_key: String,
        #[source]
        source: Box<PubChemError>,
    },

    /// Pagination stopped early; `fetched` results were already returned
    #[error("Results incomplete after {fetched} records: {source}")]
    PartialResults {
        fetched: usize,
        #[source]
        source: Box<PubChemError>,
    },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PubChemError {
    /// Failure class, where the taxonomy applies
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            PubChemError::Precondition(_) => Some(ErrorKind::PreconditionError),
            PubChemError::Server(fault) => Some(fault.kind),
            PubChemError::ResponseParse(_) => Some(ErrorKind::ResponseParseError),
            PubChemError::Transport(TransportError::Timeout(_)) => Some(ErrorKind::Timeout),
            PubChemError::Transport(_) => Some(ErrorKind::ServerError),
            PubChemError::PollTimeout { .. } => Some(ErrorKind::Timeout),
            PubChemError::ListKeyFailed { source, .. } => source.kind(),
            PubChemError::PartialResults { source, .. } => source.kind(),
            PubChemError::ListKeyExpired { .. } | PubChemError::Cancelled | PubChemError::Io(_) => {
                None
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == Some(ErrorKind::NotFound)
    }

    /// HTTP status of a server fault
    pub fn status(&self) -> Option<u16> {
        match self {
            PubChemError::Server(fault) => fault.status,
            PubChemError::ListKeyFailed { source, .. }
            | PubChemError::PartialResults { source, .. } => source.status(),
            _ => None,
        }
    }
}

impl From<ServerFault> for PubChemError {
    fn from(fault: ServerFault) -> Self {
        PubChemError::Server(fault)
    }
}

impl From<RecordError> for PubChemError {
    fn from(err: RecordError) -> Self {
        PubChemError::ResponseParse(err.to_string())
    }
}

impl From<serde_json::Error> for PubChemError {
    fn from(err: serde_json::Error) -> Self {
        PubChemError::ResponseParse(format!("JSON: {}", err))
    }
}

/// A fully resolved HTTP request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

/// Raw HTTP response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Executes HTTP requests; the client never opens sockets itself
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_projection() {
        let timeout = PubChemError::PollTimeout {
            list_key: "123".into(),
            waited: Duration::from_secs(300),
        };
        assert_eq!(timeout.kind(), Some(ErrorKind::Timeout));

        let expired = PubChemError::ListKeyExpired {
            list_key: "123".into(),
        };
        assert_eq!(expired.kind(), None);

        let connect = PubChemError::Transport(TransportError::Connect("refused".into()));
        assert_eq!(connect.kind(), Some(ErrorKind::ServerError));

        let wrapped = PubChemError::PartialResults {
            fetched: 4,
            source: Box::new(PubChemError::Transport(TransportError::Timeout("t".into()))),
        };
        assert_eq!(wrapped.kind(), Some(ErrorKind::Timeout));
    }

    #[test]
    fn test_transient_kinds() {
        assert!(ErrorKind::ServerBusy.is_transient());
        assert!(ErrorKind::ServerError.is_transient());
        assert!(!ErrorKind::NotFound.is_transient());
        assert!(!ErrorKind::PreconditionError.is_transient());
    }
}
