//! Synchronous client for the Increase banking API.
//!
//! # Overview
//! `Client` owns the client-level `RequestOptions` and hands out one service
//! per resource (`accounts()`, `ach_transfers()`, ...). Service methods
//! encode typed parameters, run the request through a retrying executor and
//! decode the response into typed structs that keep unknown fields in an
//! `extra` map. List endpoints return a `Page` that can fetch the next page
//! or turn into an `AutoPager` over every item.
//!
//! # Design
//! - Requests and responses are plain data (`HttpRequest`, `HttpResponse`);
//!   the only I/O happens behind the `Transport` trait, so the pipeline can
//!   be driven by a scripted transport in tests.
//! - Options layer `defaults < client < service < call` and resolve once
//!   per call into a `RequestConfig`.
//! - Optional request fields are `Field<T>`, which tells "not set" apart
//!   from an explicit `null`.
//! - Categorical strings are extensible enums; new server values decode
//!   into `Other(..)` instead of failing.

mod macros;

pub mod cancel;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod field;
pub mod http;
pub mod options;
pub mod pagination;
pub mod query;
pub mod resources;
pub mod retry;
pub mod transport;

pub use cancel::CancellationToken;
pub use client::Client;
pub use codec::{Extras, Params};
pub use config::Environment;
pub use error::{ApiError, ApiErrorType, Error, FieldError, Result};
pub use field::Field;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use options::{RequestConfig, RequestOptions};
pub use pagination::{AutoPager, Page};
pub use query::{ArrayFormat, NestedFormat, QueryEncoder};
pub use retry::RetryPolicy;
pub use transport::{SendContext, Transport, UreqTransport};
