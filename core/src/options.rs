//! Layered request options.
//!
//! # Design
//! `RequestOptions` is a bag of optional settings. The client keeps one
//! layer, each service can carry another, and `merge` stacks them so the
//! later layer wins: defaults < client < service/call. `resolve` turns the
//! stacked layers into a concrete `RequestConfig` once per call.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::cancel::CancellationToken;
use crate::codec::Extras;
use crate::config::{Environment, DEFAULT_TIMEOUT, PRODUCTION_URL};
use crate::http::HttpResponse;
use crate::query::QueryEncoder;
use crate::retry::RetryPolicy;
use crate::transport::Transport;

/// Callback receiving the raw response of a call's final attempt.
pub type ResponseHook = Arc<dyn Fn(&HttpResponse) + Send + Sync>;

/// Optional settings applied to requests.
#[derive(Clone, Default)]
pub struct RequestOptions {
    api_key: Option<String>,
    base_url: Option<String>,
    timeout: Option<Duration>,
    max_retries: Option<u32>,
    initial_retry_delay: Option<Duration>,
    max_retry_delay: Option<Duration>,
    idempotency_key: Option<String>,
    headers: Vec<(String, String)>,
    query: Vec<(String, String)>,
    json_fields: Extras,
    query_encoder: Option<QueryEncoder>,
    transport: Option<Arc<dyn Transport>>,
    cancel: Option<CancellationToken>,
    on_response: Option<ResponseHook>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sent as `Authorization: Bearer <key>`.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn environment(self, environment: Environment) -> Self {
        self.base_url(environment.base_url())
    }

    /// Deadline for the whole call, retries and backoff included.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    pub fn retry_delays(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_retry_delay = Some(initial);
        self.max_retry_delay = Some(max);
        self
    }

    pub fn idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// Add a header; a later header with the same name replaces it.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Add a query parameter, replacing any generated one with the same key.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Set a top-level member of the JSON body, over any generated value.
    pub fn json_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.json_fields.insert(key.into(), value);
        self
    }

    pub fn query_encoder(mut self, encoder: QueryEncoder) -> Self {
        self.query_encoder = Some(encoder);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn on_response(mut self, hook: impl Fn(&HttpResponse) + Send + Sync + 'static) -> Self {
        self.on_response = Some(Arc::new(hook));
        self
    }

    /// Stack `other` on top of `self`.
    pub fn merge(&self, other: &RequestOptions) -> RequestOptions {
        let mut json_fields = self.json_fields.clone();
        for (key, value) in &other.json_fields {
            json_fields.insert(key.clone(), value.clone());
        }
        RequestOptions {
            api_key: other.api_key.clone().or_else(|| self.api_key.clone()),
            base_url: other.base_url.clone().or_else(|| self.base_url.clone()),
            timeout: other.timeout.or(self.timeout),
            max_retries: other.max_retries.or(self.max_retries),
            initial_retry_delay: other.initial_retry_delay.or(self.initial_retry_delay),
            max_retry_delay: other.max_retry_delay.or(self.max_retry_delay),
            idempotency_key: other
                .idempotency_key
                .clone()
                .or_else(|| self.idempotency_key.clone()),
            headers: self.headers.iter().chain(&other.headers).cloned().collect(),
            query: self.query.iter().chain(&other.query).cloned().collect(),
            json_fields,
            query_encoder: other.query_encoder.or(self.query_encoder),
            transport: other.transport.clone().or_else(|| self.transport.clone()),
            cancel: other.cancel.clone().or_else(|| self.cancel.clone()),
            on_response: other.on_response.clone().or_else(|| self.on_response.clone()),
        }
    }

    /// Fill every unset option with its default.
    pub fn resolve(&self) -> RequestConfig {
        let defaults = RetryPolicy::default();
        RequestConfig {
            base_url: self
                .base_url
                .clone()
                .unwrap_or_else(|| PRODUCTION_URL.to_string()),
            api_key: self.api_key.clone(),
            timeout: Some(self.timeout.unwrap_or(DEFAULT_TIMEOUT)),
            retry: RetryPolicy {
                max_retries: self.max_retries.unwrap_or(defaults.max_retries),
                initial_delay: self.initial_retry_delay.unwrap_or(defaults.initial_delay),
                max_delay: self.max_retry_delay.unwrap_or(defaults.max_delay),
            },
            idempotency_key: self.idempotency_key.clone(),
            headers: self.headers.clone(),
            query: self.query.clone(),
            json_fields: self.json_fields.clone(),
            query_encoder: self.query_encoder.unwrap_or_default(),
            transport: self.transport.clone(),
            cancel: self.cancel.clone(),
            on_response: self.on_response.clone(),
        }
    }
}

impl fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOptions")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("idempotency_key", &self.idempotency_key)
            .field("headers", &self.headers)
            .field("query", &self.query)
            .field("json_fields", &self.json_fields)
            .field("transport", &self.transport)
            .field("on_response", &self.on_response.as_ref().map(|_| "<hook>"))
            .finish_non_exhaustive()
    }
}

/// Fully resolved settings for one call.
#[derive(Clone)]
pub struct RequestConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout: Option<Duration>,
    pub retry: RetryPolicy,
    pub idempotency_key: Option<String>,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub json_fields: Extras,
    pub query_encoder: QueryEncoder,
    pub transport: Option<Arc<dyn Transport>>,
    pub cancel: Option<CancellationToken>,
    pub on_response: Option<ResponseHook>,
}

impl fmt::Debug for RequestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestConfig")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("idempotency_key", &self.idempotency_key)
            .finish_non_exhaustive()
    }
}
