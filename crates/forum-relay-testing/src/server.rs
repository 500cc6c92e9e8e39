use super::expectation::{Expectation, MockResponse, Times};
use super::matcher::{basic_auth_user, CallMatcher};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

type GenericError = Box<dyn std::error::Error + Send + Sync>;
type Result<T> = std::result::Result<T, GenericError>;

/// A mock Segment-style ingestion endpoint
///
/// Every call is recorded. Calls are answered by the most recently added
/// matching expectation, or with a plain success when none matches.
pub struct MockIngestion {
    addr: SocketAddr,
    state: Arc<Mutex<ServerState>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

struct ServerState {
    expectations: Vec<Expectation>,
    received: Vec<ReceivedCall>,
}

/// A call the mock endpoint received.
#[derive(Debug, Clone)]
pub struct ReceivedCall {
    pub method: http::Method,
    pub path: String,
    /// Last path segment, `identify`, `track` or `page`
    pub kind: String,
    /// User name from the Basic auth header
    pub write_key: Option<String>,
    pub headers: http::HeaderMap,
    /// Parsed JSON body, `Value::Null` when the body is not JSON
    pub body: Value,
    /// Whether any expectation matched the call
    pub matched: bool,
}

impl ReceivedCall {
    /// Field of the JSON body by pointer, e.g. `/properties/topic_id`.
    pub fn field(&self, pointer: &str) -> Option<&Value> {
        self.body.pointer(pointer)
    }

    /// `event` of a track call or `name` of a page call.
    pub fn event_name(&self) -> Option<&str> {
        self.body
            .get("event")
            .or_else(|| self.body.get("name"))
            .and_then(Value::as_str)
    }
}

fn lock(state: &Mutex<ServerState>) -> MutexGuard<'_, ServerState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

impl MockIngestion {
    /// Start a new mock endpoint on a random local port
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock ingestion listener");
        let addr = listener.local_addr().expect("mock ingestion local addr");

        let state = Arc::new(Mutex::new(ServerState {
            expectations: Vec::new(),
            received: Vec::new(),
        }));

        let state_clone = state.clone();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            let mut stop_future = shutdown_rx;

            loop {
                tokio::select! {
                    res = listener.accept() => {
                        match res {
                            Ok((stream, _)) => {
                                let io = TokioIo::new(stream);
                                let state = state_clone.clone();

                                tokio::spawn(async move {
                                    if let Err(err) = hyper_util::server::conn::auto::Builder::new(hyper_util::rt::TokioExecutor::new())
                                        .serve_connection(io, service_fn(move |req| handle_call(req, state.clone())))
                                        .await
                                    {
                                        tracing::debug!(error = ?err, "Mock ingestion connection error");
                                    }
                                });
                            }
                            Err(e) => tracing::warn!(error = %e, "Mock ingestion accept error"),
                        }
                    }
                    _ = &mut stop_future => {
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Base URL to use as the relay endpoint
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Every call received so far, in arrival order
    pub fn calls(&self) -> Vec<ReceivedCall> {
        lock(&self.state).received.clone()
    }

    /// Calls that matched no expectation
    pub fn unmatched_calls(&self) -> Vec<ReceivedCall> {
        lock(&self.state)
            .received
            .iter()
            .filter(|c| !c.matched)
            .cloned()
            .collect()
    }

    /// Forget received calls; expectations stay.
    pub fn reset_calls(&self) {
        lock(&self.state).received.clear();
    }

    /// Add an expectation
    pub fn expect(&self, matcher: CallMatcher) -> ExpectationBuilder {
        ExpectationBuilder {
            server: self.state.clone(),
            expectation: Some(Expectation::new(matcher)),
        }
    }

    /// Verify that all expectations were met
    pub fn verify(&self) {
        let state = lock(&self.state);
        for exp in &state.expectations {
            assert!(
                exp.is_satisfied(),
                "Expectation {:?} expected {:?} calls, got {}",
                exp.matcher,
                exp.times,
                exp.call_count
            );
        }
    }
}

impl Drop for MockIngestion {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Registers its expectation when dropped.
pub struct ExpectationBuilder {
    server: Arc<Mutex<ServerState>>,
    expectation: Option<Expectation>,
}

impl ExpectationBuilder {
    pub fn respond_with(mut self, response: MockResponse) -> Self {
        if let Some(exp) = self.expectation.as_mut() {
            exp.response = response;
        }
        self
    }

    pub fn times(mut self, n: usize) -> Self {
        if let Some(exp) = self.expectation.as_mut() {
            exp.times = Times::Exactly(n);
        }
        self
    }

    pub fn once(mut self) -> Self {
        if let Some(exp) = self.expectation.as_mut() {
            exp.times = Times::Once;
        }
        self
    }

    pub fn at_least_once(mut self) -> Self {
        if let Some(exp) = self.expectation.as_mut() {
            exp.times = Times::AtLeast(1);
        }
        self
    }

    pub fn never(mut self) -> Self {
        if let Some(exp) = self.expectation.as_mut() {
            exp.times = Times::Exactly(0);
        }
        self
    }
}

impl Drop for ExpectationBuilder {
    fn drop(&mut self) {
        if let Some(exp) = self.expectation.take() {
            lock(&self.server).expectations.push(exp);
        }
    }
}

async fn handle_call(
    req: Request<hyper::body::Incoming>,
    state: Arc<Mutex<ServerState>>,
) -> Result<Response<Full<Bytes>>> {
    let (parts, body) = req.into_parts();
    let body_bytes = body.collect().await?.to_bytes();
    let path = parts.uri.path().to_string();

    let mut state_guard = lock(&state);

    // Later expectations override earlier ones
    let matching_idx = state_guard
        .expectations
        .iter()
        .enumerate()
        .rev()
        .find(|(_, exp)| {
            exp.matcher
                .matches(&parts.method, &path, &parts.headers, &body_bytes)
        })
        .map(|(i, _)| i);

    let response = match matching_idx {
        Some(idx) => {
            let exp = &mut state_guard.expectations[idx];
            exp.call_count += 1;
            exp.response.clone()
        }
        None => MockResponse::default(),
    };

    let kind = path.rsplit('/').next().unwrap_or_default().to_string();
    state_guard.received.push(ReceivedCall {
        method: parts.method.clone(),
        kind,
        write_key: basic_auth_user(&parts.headers),
        body: serde_json::from_slice(&body_bytes).unwrap_or(Value::Null),
        headers: parts.headers,
        path,
        matched: matching_idx.is_some(),
    });

    Ok(Response::builder()
        .status(response.status)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Full::new(response.body))?)
}
