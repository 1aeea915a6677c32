//! Scripted HTTP client for tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{HttpClient, HttpError, HttpRequest, HttpResponse};

/// Mock HTTP client that returns a configurable sequence of responses
/// and records every request it receives.
///
/// Once the script is exhausted, every further request gets a 200 with an empty JSON object.
#[derive(Debug, Default)]
pub struct ScriptedClient {
    responses: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
    requests: Mutex<Vec<HttpRequest>>,
    call_count: AtomicUsize,
}

impl ScriptedClient {
    /// Creates a client that replays `responses` in order.
    #[must_use]
    pub fn new(responses: Vec<Result<HttpResponse, HttpError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        }
    }

    /// Creates a client that answers every request with the given JSON body.
    #[must_use]
    pub fn json(body: &serde_json::Value) -> Self {
        Self::new(vec![Ok(HttpResponse::ok(body.to_string()))])
    }

    /// Creates a client that answers with `status` and an empty body.
    #[must_use]
    pub fn status(status: http::StatusCode) -> Self {
        Self::new(vec![Ok(HttpResponse::new(
            status,
            http::HeaderMap::new(),
            Vec::new(),
        ))])
    }

    /// Appends a response to the script.
    pub fn push(&self, response: Result<HttpResponse, HttpError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    /// Returns how many requests were made.
    pub fn calls(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Returns a copy of every request received so far.
    pub fn captured_requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Returns the JSON body of the `index`-th request.
    pub fn request_json(&self, index: usize) -> serde_json::Value {
        let requests = self.requests.lock().unwrap();
        let body = requests[index].body.as_ref().expect("request has a body");
        serde_json::from_slice(body).unwrap()
    }
}

impl HttpClient for ScriptedClient {
    async fn request(&self, req: HttpRequest) -> Result<HttpResponse, HttpError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(req);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(HttpResponse::ok("{}")))
    }
}
