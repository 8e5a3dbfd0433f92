//! Defaults and environment-provided settings.

use std::env;
use std::time::Duration;

use crate::options::RequestOptions;

pub const PRODUCTION_URL: &str = "https://api.increase.com";
pub const SANDBOX_URL: &str = "https://sandbox.increase.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

pub const API_KEY_ENV: &str = "INCREASE_API_KEY";
pub const BASE_URL_ENV: &str = "INCREASE_BASE_URL";

pub(crate) const USER_AGENT: &str = concat!("increase-rust/", env!("CARGO_PKG_VERSION"));
pub(crate) const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Which Increase deployment to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Production,
    Sandbox,
}

impl Environment {
    pub fn base_url(&self) -> &'static str {
        match self {
            Environment::Production => PRODUCTION_URL,
            Environment::Sandbox => SANDBOX_URL,
        }
    }
}

impl RequestOptions {
    /// Options taken from `INCREASE_API_KEY` and `INCREASE_BASE_URL`.
    ///
    /// Unset or empty variables leave the matching option unset.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut options = RequestOptions::new();
        if let Some(key) = lookup(API_KEY_ENV).filter(|v| !v.is_empty()) {
            options = options.api_key(key);
        }
        if let Some(url) = lookup(BASE_URL_ENV).filter(|v| !v.is_empty()) {
            options = options.base_url(url);
        }
        options
    }
}
