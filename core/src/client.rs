//! The shared request pipeline behind every service.
//!
//! # Design
//! `Client` is a cheap handle (`Arc` inside) holding the client-level
//! options and the default transport. A call flows through three steps:
//! `build_request` turns a resolved config plus a `Call` into plain data,
//! `round_trip` hands it to the transport (retrying transient failures),
//! and `parse_response` decodes the final body. Only `round_trip` touches
//! the network, so the other two stay deterministic.

use std::sync::Arc;
use std::time::Instant;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, trace, warn};
use url::Url;
use uuid::Uuid;

use crate::cancel::CancellationToken;
use crate::codec;
use crate::config::{IDEMPOTENCY_HEADER, USER_AGENT};
use crate::error::{ApiError, Error, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::options::{RequestConfig, RequestOptions};
use crate::pagination::{Page, PageRequest};
use crate::resources::{
    AccountService, AccountTransferService, AchTransferService, CardService, EntityService,
    SimulationService, TransactionService,
};
use crate::transport::{SendContext, Transport, UreqTransport};

/// Entry point for the Increase API.
///
/// Cloning is cheap and clones share configuration, so one client can be
/// handed to many threads.
#[derive(Debug, Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

#[derive(Debug)]
struct ClientInner {
    options: RequestOptions,
    transport: Arc<dyn Transport>,
}

/// One API operation before configuration is applied.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Call {
    pub method: HttpMethod,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Map<String, Value>>,
}

impl Call {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Patch, path)
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    pub fn with_body(mut self, body: Map<String, Value>) -> Self {
        self.body = Some(body);
        self
    }
}

impl Client {
    pub fn new(options: RequestOptions) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                options,
                transport: Arc::new(UreqTransport::new()),
            }),
        }
    }

    /// A client configured from `INCREASE_API_KEY` and `INCREASE_BASE_URL`.
    pub fn from_env() -> Self {
        Self::new(RequestOptions::from_env())
    }

    /// The client-level option layer.
    pub fn options(&self) -> &RequestOptions {
        &self.inner.options
    }

    pub fn accounts(&self) -> AccountService {
        AccountService::new(self.clone())
    }

    pub fn account_transfers(&self) -> AccountTransferService {
        AccountTransferService::new(self.clone())
    }

    pub fn ach_transfers(&self) -> AchTransferService {
        AchTransferService::new(self.clone())
    }

    pub fn cards(&self) -> CardService {
        CardService::new(self.clone())
    }

    pub fn entities(&self) -> EntityService {
        EntityService::new(self.clone())
    }

    pub fn transactions(&self) -> TransactionService {
        TransactionService::new(self.clone())
    }

    pub fn simulations(&self) -> SimulationService {
        SimulationService::new(self.clone())
    }

    /// Run `call` with `options` layered over the client options and decode
    /// the success body into `T`.
    pub(crate) fn execute<T: DeserializeOwned>(&self, call: &Call, options: &RequestOptions) -> Result<T> {
        let response = self.round_trip(call, options)?;
        parse_response(&response)
    }

    /// Fetch the first page of a list endpoint.
    pub(crate) fn execute_page<T: DeserializeOwned>(
        &self,
        path: impl Into<String>,
        query: Vec<(String, String)>,
        options: &RequestOptions,
    ) -> Result<Page<T>> {
        PageRequest::new(self.clone(), path.into(), query, options.clone()).fetch()
    }

    pub(crate) fn resolve(&self, options: &RequestOptions) -> RequestConfig {
        self.inner.options.merge(options).resolve()
    }

    fn round_trip(&self, call: &Call, options: &RequestOptions) -> Result<HttpResponse> {
        let mut config = self.resolve(options);
        if call.method != HttpMethod::Get && config.idempotency_key.is_none() {
            // One key per call, shared by its retries.
            config.idempotency_key = Some(format!("increase-rust-retry-{}", Uuid::new_v4()));
        }
        let request = build_request(call, &config)?;
        let transport = config
            .transport
            .clone()
            .unwrap_or_else(|| self.inner.transport.clone());
        let cancel = config.cancel.as_ref();
        // One deadline for the whole call, backoff included.
        let deadline = config.timeout.map(|timeout| Instant::now() + timeout);

        let mut attempt = 0;
        loop {
            if cancel.is_some_and(CancellationToken::is_canceled) {
                return Err(Error::Canceled);
            }
            let remaining = match deadline {
                Some(deadline) => match deadline.checked_duration_since(Instant::now()) {
                    Some(left) if !left.is_zero() => Some(left),
                    _ => return Err(Error::Transport("call deadline exceeded".into())),
                },
                None => None,
            };
            debug!(method = %request.method, url = %request.url, attempt, "sending request");
            if let Some(body) = &request.body {
                trace!(%body, "request body");
            }

            let context = SendContext {
                timeout: remaining,
                cancel,
                attempt,
            };
            let failure = match transport.send(&request, context) {
                Ok(response) => {
                    trace!(status = response.status, body = %response.body, "response received");
                    if response.is_success() {
                        return Ok(finish(&config, response));
                    }
                    if !config.retry.should_retry(attempt, Some(&response)) {
                        return Err(Retry::Response(response).into_error(&config));
                    }
                    Retry::Response(response)
                }
                Err(Error::Transport(_)) if cancel.is_some_and(CancellationToken::is_canceled) => {
                    return Err(Error::Canceled);
                }
                Err(Error::Transport(message)) => {
                    if !config.retry.should_retry(attempt, None) {
                        return Err(Error::Transport(message));
                    }
                    Retry::Transport(message)
                }
                Err(other) => return Err(other),
            };

            let delay = config.retry.delay(attempt, failure.response());
            if deadline.is_some_and(|deadline| Instant::now() + delay >= deadline) {
                debug!(method = %request.method, url = %request.url, attempt, "no time left to retry");
                return Err(failure.into_error(&config));
            }
            warn!(
                method = %request.method,
                url = %request.url,
                attempt,
                reason = %failure,
                delay_ms = delay.as_millis() as u64,
                "retrying request"
            );
            let canceled = match cancel {
                Some(token) => token.sleep(delay),
                None => {
                    std::thread::sleep(delay);
                    false
                }
            };
            if canceled {
                return Err(Error::Canceled);
            }
            attempt += 1;
        }
    }
}

enum Retry {
    Response(HttpResponse),
    Transport(String),
}

impl Retry {
    fn response(&self) -> Option<&HttpResponse> {
        match self {
            Retry::Response(response) => Some(response),
            Retry::Transport(_) => None,
        }
    }

    /// The error reported when this failure is the last attempt.
    fn into_error(self, config: &RequestConfig) -> Error {
        match self {
            Retry::Response(response) => {
                let response = finish(config, response);
                ApiError::from_response(response.status, &response.body).into()
            }
            Retry::Transport(message) => Error::Transport(message),
        }
    }
}

impl std::fmt::Display for Retry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Retry::Response(response) => write!(f, "status {}", response.status),
            Retry::Transport(message) => f.write_str(message),
        }
    }
}

fn finish(config: &RequestConfig, response: HttpResponse) -> HttpResponse {
    if let Some(hook) = &config.on_response {
        hook(&response);
    }
    response
}

/// Assemble the wire request for `call` under `config`.
pub(crate) fn build_request(call: &Call, config: &RequestConfig) -> Result<HttpRequest> {
    let url = format!("{}{}", config.base_url.trim_end_matches('/'), call.path);

    let mut query: Vec<(String, String)> = call
        .query
        .iter()
        .filter(|(key, _)| !config.query.iter().any(|(k, _)| k == key))
        .cloned()
        .chain(config.query.iter().cloned())
        .collect();
    query.sort_by(|a, b| a.0.cmp(&b.0));

    let body = match (&call.body, config.json_fields.is_empty()) {
        (None, true) => None,
        (body, _) => {
            let mut object = body.clone().unwrap_or_default();
            for (key, value) in &config.json_fields {
                object.insert(key.clone(), value.clone());
            }
            Some(serde_json::to_string(&object).map_err(|e| Error::InvalidRequest(e.to_string()))?)
        }
    };

    let mut headers = Vec::new();
    set_header(&mut headers, "Accept", "application/json");
    set_header(&mut headers, "User-Agent", USER_AGENT);
    if let Some(key) = &config.api_key {
        set_header(&mut headers, "Authorization", &format!("Bearer {key}"));
    }
    if body.is_some() {
        set_header(&mut headers, "Content-Type", "application/json");
    }
    if call.method != HttpMethod::Get {
        if let Some(key) = &config.idempotency_key {
            set_header(&mut headers, IDEMPOTENCY_HEADER, key);
        }
    }
    for (name, value) in &config.headers {
        set_header(&mut headers, name, value);
    }

    Ok(HttpRequest {
        method: call.method,
        url,
        query,
        headers,
        body,
    })
}

fn set_header(headers: &mut Vec<(String, String)>, name: &str, value: &str) {
    headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    headers.push((name.to_string(), value.to_string()));
}

/// Decode a success body, or the error it carries.
pub(crate) fn parse_response<T: DeserializeOwned>(response: &HttpResponse) -> Result<T> {
    if !response.is_success() {
        return Err(ApiError::from_response(response.status, &response.body).into());
    }
    codec::decode(&response.body)
}

/// Reject empty path parameters before anything is sent, and percent-encode
/// the rest so each stays a single path segment.
pub(crate) fn require_id(name: &'static str, id: &str) -> Result<String> {
    if id.trim().is_empty() {
        return Err(Error::MissingParameter(name));
    }
    let mut url = Url::parse("http://segment.invalid/").map_err(|e| Error::InvalidRequest(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|()| Error::InvalidRequest(format!("cannot encode {name}")))?
        .pop_if_empty()
        .push(id);
    Ok(url.path().trim_start_matches('/').to_string())
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted transport used by the unit tests in this crate.

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Default)]
    pub struct Scripted {
        replies: Mutex<VecDeque<Result<HttpResponse>>>,
        pub requests: Mutex<Vec<HttpRequest>>,
    }

    impl Scripted {
        pub fn new(replies: Vec<Result<HttpResponse>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        pub fn requests(&self) -> Vec<HttpRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl Transport for Scripted {
        fn send(&self, request: &HttpRequest, _context: SendContext<'_>) -> Result<HttpResponse> {
            self.requests.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Error::Transport("script exhausted".to_string())))
        }
    }

    pub fn json(status: u16, body: &str) -> Result<HttpResponse> {
        Ok(HttpResponse {
            status,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: body.to_string(),
        })
    }

    /// A client wired to `transport` with instant retries.
    pub fn client(transport: Arc<Scripted>) -> Client {
        Client::new(
            RequestOptions::new()
                .api_key("test-key")
                .base_url("http://mock.test")
                .retry_delays(std::time::Duration::ZERO, std::time::Duration::ZERO)
                .transport(transport),
        )
    }
}
