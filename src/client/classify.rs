//! Maps HTTP status codes and fault envelopes onto [`ErrorKind`].

use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ErrorKind;

/// A fault reported by the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerFault {
    pub kind: ErrorKind,
    /// Absent for faults found in a successful response body
    pub status: Option<u16>,
    /// Service fault code such as `PUGREST.NotFound`
    pub code: Option<String>,
    pub message: String,
    pub details: Vec<String>,
}

impl fmt::Display for ServerFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PubChem HTTP error")?;
        if let Some(status) = self.status {
            write!(f, " {}", status)?;
        }
        if let Some(code) = &self.code {
            write!(f, " {}", code)?;
        }
        write!(f, ": {}", self.message)?;
        if !self.details.is_empty() {
            write!(f, " ({})", self.details.join("; "))?;
        }
        Ok(())
    }
}

impl ServerFault {
    /// Whether the fault text refers to the list key itself
    pub fn mentions_list_key(&self) -> bool {
        std::iter::once(&self.message)
            .chain(&self.details)
            .any(|text| {
                let text = text.to_ascii_lowercase();
                text.contains("listkey") || text.contains("list key")
            })
    }
}

#[derive(Debug, Deserialize)]
struct FaultEnvelope {
    #[serde(rename = "Fault")]
    fault: RawFault,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawFault {
    #[serde(rename = "Code", default)]
    code: Option<String>,
    #[serde(rename = "Message", default)]
    message: Option<String>,
    #[serde(rename = "Details", default)]
    details: Details,
}

#[derive(Debug, Default, Deserialize)]
#[serde(untagged)]
enum Details {
    #[default]
    None,
    One(String),
    Many(Vec<String>),
}

impl Details {
    fn into_vec(self) -> Vec<String> {
        match self {
            Details::None => Vec::new(),
            Details::One(detail) => vec![detail],
            Details::Many(details) => details,
        }
    }
}

/// Parse a `{"Fault": {...}}` envelope
pub(crate) fn parse_fault(body: &[u8]) -> Option<RawFault> {
    serde_json::from_slice::<FaultEnvelope>(body)
        .ok()
        .map(|envelope| envelope.fault)
}

fn kind_for_code(code: &str) -> Option<ErrorKind> {
    let name = code.strip_prefix("PUGREST.").unwrap_or(code);
    match name {
        "BadRequest" => Some(ErrorKind::BadRequest),
        "NotFound" => Some(ErrorKind::NotFound),
        "NotAllowed" | "MethodNotAllowed" => Some(ErrorKind::MethodNotAllowed),
        "Timeout" => Some(ErrorKind::Timeout),
        "ServerBusy" => Some(ErrorKind::ServerBusy),
        "Unimplemented" => Some(ErrorKind::Unimplemented),
        "ServerError" | "Unknown" => Some(ErrorKind::ServerError),
        _ => None,
    }
}

fn is_busy_message(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("busy") || message.contains("too many requests")
}

fn kind_for_status(status: StatusCode, code: Option<&str>, message: &str) -> ErrorKind {
    if code.and_then(kind_for_code) == Some(ErrorKind::Timeout) {
        return ErrorKind::Timeout;
    }

    match status.as_u16() {
        400 => ErrorKind::BadRequest,
        404 => ErrorKind::NotFound,
        405 => ErrorKind::MethodNotAllowed,
        429 => ErrorKind::ServerBusy,
        501 => ErrorKind::Unimplemented,
        503 => {
            let busy_code = code.is_some_and(|c| c.contains("ServerBusy"));
            if busy_code || is_busy_message(message) {
                ErrorKind::ServerBusy
            } else {
                ErrorKind::ServerError
            }
        }
        504 => ErrorKind::Timeout,
        s if (400..500).contains(&s) => ErrorKind::BadRequest,
        s if s >= 500 => ErrorKind::ServerError,
        // a fault inside a successful response
        _ => code.and_then(kind_for_code).unwrap_or(ErrorKind::ServerError),
    }
}

/// Classify a response carrying a fault, either by status or by its envelope
pub fn classify(status: StatusCode, body: &[u8]) -> ServerFault {
    let (code, message, details) = match parse_fault(body) {
        Some(fault) => (fault.code, fault.message, fault.details.into_vec()),
        None => (None, None, Vec::new()),
    };

    let message = message.unwrap_or_else(|| {
        let text = String::from_utf8_lossy(body);
        let text = text.trim();
        if text.is_empty() || text.len() > 200 {
            status.canonical_reason().unwrap_or("Unknown error").to_string()
        } else {
            text.to_string()
        }
    });

    let kind = kind_for_status(status, code.as_deref(), &message);
    let status = (!status.is_success()).then(|| status.as_u16());

    ServerFault {
        kind,
        status,
        code,
        message,
        details,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fault_body(code: &str, message: &str) -> Vec<u8> {
        format!(
            r#"{{"Fault": {{"Code": "{}", "Message": "{}", "Details": ["detail"]}}}}"#,
            code, message
        )
        .into_bytes()
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (400, ErrorKind::BadRequest),
            (404, ErrorKind::NotFound),
            (405, ErrorKind::MethodNotAllowed),
            (429, ErrorKind::ServerBusy),
            (500, ErrorKind::ServerError),
            (501, ErrorKind::Unimplemented),
            (504, ErrorKind::Timeout),
            (418, ErrorKind::BadRequest),
            (502, ErrorKind::ServerError),
        ];
        for (status, expected) in cases {
            let fault = classify(StatusCode::from_u16(status).unwrap(), b"");
            assert_eq!(fault.kind, expected, "status {}", status);
            assert_eq!(fault.status, Some(status));
        }
    }

    #[test]
    fn test_503_busy_versus_generic() {
        let busy = classify(
            StatusCode::SERVICE_UNAVAILABLE,
            &fault_body("PUGREST.ServerBusy", "Too many requests or server too busy"),
        );
        assert_eq!(busy.kind, ErrorKind::ServerBusy);

        let generic = classify(
            StatusCode::SERVICE_UNAVAILABLE,
            &fault_body("PUGREST.ServerError", "Maintenance"),
        );
        assert_eq!(generic.kind, ErrorKind::ServerError);
    }

    #[test]
    fn test_timeout_code_wins_over_status() {
        let fault = classify(
            StatusCode::INTERNAL_SERVER_ERROR,
            &fault_body("PUGREST.Timeout", "Request timed out"),
        );
        assert_eq!(fault.kind, ErrorKind::Timeout);
    }

    #[test]
    fn test_fault_in_successful_body() {
        let fault = classify(StatusCode::OK, &fault_body("PUGREST.NotFound", "No CID found"));
        assert_eq!(fault.kind, ErrorKind::NotFound);
        assert_eq!(fault.status, None);
    }

    #[test]
    fn test_display_and_details() {
        let fault = classify(
            StatusCode::NOT_FOUND,
            &fault_body("PUGREST.NotFound", "No CID found"),
        );
        assert_eq!(
            fault.to_string(),
            "PubChem HTTP error 404 PUGREST.NotFound: No CID found (detail)"
        );
        assert!(!fault.mentions_list_key());
    }

    #[test]
    fn test_plain_text_body() {
        let fault = classify(StatusCode::BAD_REQUEST, b"Invalid ListKey");
        assert_eq!(fault.message, "Invalid ListKey");
        assert!(fault.mentions_list_key());
    }
}
