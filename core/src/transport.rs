//! The I/O seam between the request pipeline and the network.
//!
//! # Design
//! The client never talks to sockets itself. It builds an `HttpRequest`,
//! passes it to a `Transport`, and interprets the `HttpResponse` it gets
//! back. `UreqTransport` is the default; tests and callers with their own
//! HTTP stack plug in anything that implements the trait.

use std::fmt;
use std::time::Duration;

use crate::cancel::CancellationToken;
use crate::error::{Error, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Per-attempt settings handed to a transport.
#[derive(Debug, Clone, Copy, Default)]
pub struct SendContext<'a> {
    /// Time left before the call's deadline, connect through body read.
    pub timeout: Option<Duration>,
    /// Transports should stop waiting on the network once this fires.
    pub cancel: Option<&'a CancellationToken>,
    /// Zero for the first attempt.
    pub attempt: u32,
}

/// Executes one HTTP exchange.
///
/// Implementations return non-2xx responses as `Ok`; status interpretation
/// and retries belong to the client. Only failures that produced no response
/// at all should be `Err(Error::Transport)`.
pub trait Transport: Send + Sync + fmt::Debug {
    fn send(&self, request: &HttpRequest, context: SendContext<'_>) -> Result<HttpResponse>;
}

/// Blocking transport backed by a `ureq` agent.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        Self { agent: agent() }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Status codes are data here, not errors.
fn agent() -> ureq::Agent {
    ureq::Agent::config_builder()
        .http_status_as_error(false)
        .build()
        .new_agent()
}

impl Transport for UreqTransport {
    fn send(&self, request: &HttpRequest, context: SendContext<'_>) -> Result<HttpResponse> {
        let Some(token) = context.cancel else {
            return exchange(&self.agent, request, context.timeout);
        };
        if token.is_canceled() {
            return Err(Error::Canceled);
        }
        // ureq blocks until the exchange ends, so wait on it from the side.
        let agent = self.agent.clone();
        let request = request.clone();
        let timeout = context.timeout;
        token.run(move || exchange(&agent, &request, timeout))
    }
}

fn exchange(agent: &ureq::Agent, request: &HttpRequest, timeout: Option<Duration>) -> Result<HttpResponse> {
    let url = request.full_url()?;
    let url = url.as_str();
    let headers = request.headers.as_slice();
    let body = request.body.as_deref();
    let result = match request.method {
        HttpMethod::Get => prepare(agent.get(url), headers, timeout).call(),
        HttpMethod::Delete => prepare(agent.delete(url), headers, timeout).call(),
        HttpMethod::Post => send_body(prepare(agent.post(url), headers, timeout), body),
        HttpMethod::Patch => send_body(prepare(agent.patch(url), headers, timeout), body),
        HttpMethod::Put => send_body(prepare(agent.put(url), headers, timeout), body),
    };
    let mut response = result.map_err(|e| Error::Transport(e.to_string()))?;

    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect();
    let body = response
        .body_mut()
        .read_to_string()
        .map_err(|e| Error::Transport(format!("failed to read response body: {e}")))?;

    Ok(HttpResponse {
        status,
        headers,
        body,
    })
}

/// Apply headers and the per-request timeout on top of the shared agent.
fn prepare<B>(
    builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
    timeout: Option<Duration>,
) -> ureq::RequestBuilder<B> {
    let builder = match timeout {
        Some(_) => builder.config().timeout_global(timeout).build(),
        None => builder,
    };
    with_headers(builder, headers)
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

fn send_body(
    builder: ureq::RequestBuilder<ureq::typestate::WithBody>,
    body: Option<&str>,
) -> std::result::Result<ureq::http::Response<ureq::Body>, ureq::Error> {
    match body {
        Some(body) => builder.send(body.as_bytes()),
        None => builder.send_empty(),
    }
}
