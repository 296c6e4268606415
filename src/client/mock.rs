//! Scripted in-memory transport for testing purposes.

use async_trait::async_trait;
use http::StatusCode;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{HttpRequest, HttpResponse, Transport, TransportError};

type Handler = Box<dyn Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync>;

/// A transport that replays queued responses and records every request.
///
/// Queued responses are used first; once the queue is empty the optional
/// handler answers, and without one the request fails.
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    handler: Option<Handler>,
    requests: Mutex<Vec<HttpRequest>>,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockTransport {
    /// Create a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every request not covered by the queue with `handler`.
    pub fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync + 'static,
    {
        Self {
            handler: Some(Box::new(handler)),
            ..Self::default()
        }
    }

    /// Queue a response.
    pub fn push(&self, response: HttpResponse) {
        locked(&self.responses).push_back(Ok(response));
    }

    /// Queue a transport failure.
    pub fn push_error(&self, error: TransportError) {
        locked(&self.responses).push_back(Err(error));
    }

    /// Every request seen so far, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        locked(&self.requests).clone()
    }

    pub fn request_count(&self) -> usize {
        locked(&self.requests).len()
    }
}

impl fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockTransport")
            .field("queued", &locked(&self.responses).len())
            .field("has_handler", &self.handler.is_some())
            .field("requests", &self.request_count())
            .finish()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        locked(&self.requests).push(request.clone());

        if let Some(response) = locked(&self.responses).pop_front() {
            return response;
        }
        match &self.handler {
            Some(handler) => handler(request),
            None => Err(TransportError::Other(format!(
                "no scripted response for {} {}",
                request.method, request.url
            ))),
        }
    }
}

/// A JSON response with the given status
pub fn json_response(status: u16, body: &Value) -> HttpResponse {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    HttpResponse::new(status, body.to_string())
}

/// A `{"Fault": ...}` response
pub fn fault_response(status: u16, code: &str, message: &str) -> HttpResponse {
    json_response(
        status,
        &json!({"Fault": {"Code": code, "Message": message, "Details": []}}),
    )
}

/// A pending-job response carrying `list_key`
pub fn waiting_response(list_key: &str) -> HttpResponse {
    json_response(
        202,
        &json!({"Waiting": {"ListKey": list_key, "Message": "Your request is running"}}),
    )
}

/// An identifier list response
pub fn cid_list_response(cids: &[u64]) -> HttpResponse {
    json_response(200, &json!({"IdentifierList": {"CID": cids}}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    fn get(url: &str) -> HttpRequest {
        HttpRequest {
            method: Method::GET,
            url: url.to_string(),
            headers: Vec::new(),
            body: None,
        }
    }

    #[tokio::test]
    async fn test_queue_then_handler() {
        let mock = MockTransport::with_handler(|_| Ok(cid_list_response(&[1])));
        mock.push(fault_response(404, "PUGREST.NotFound", "No CID found"));

        let first = mock.execute(&get("http://x/a")).await.unwrap();
        assert_eq!(first.status, StatusCode::NOT_FOUND);
        let second = mock.execute(&get("http://x/b")).await.unwrap();
        assert_eq!(second.status, StatusCode::OK);

        let urls: Vec<String> = mock.requests().into_iter().map(|r| r.url).collect();
        assert_eq!(urls, vec!["http://x/a", "http://x/b"]);
    }

    #[tokio::test]
    async fn test_unscripted_request_fails() {
        let mock = MockTransport::new();
        assert!(mock.execute(&get("http://x")).await.is_err());
        assert_eq!(mock.request_count(), 1);
    }
}
