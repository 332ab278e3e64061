// Request configuration shared by every request the scan sends

use crate::error::{Result, ScanError};
use lagprobe_core::MeanAlgorithm;
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::num::NonZeroU32;
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = concat!("lagprobe/", env!("CARGO_PKG_VERSION"));

/// How the HTTP client talks to the target. Built once before scanning and
/// read by every request afterwards.
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub headers: HeaderMap,
    pub proxy: Option<String>,
    pub validate_certificates: bool,
    pub user_agent: String,
    /// Ceiling for a single request. A timed out sample is recorded as this
    /// value rather than dropped.
    pub timeout: Duration,
    pub connectivity_timeout: Duration,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            headers: HeaderMap::new(),
            proxy: None,
            validate_certificates: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(120),
            connectivity_timeout: Duration::from_secs(10),
        }
    }
}

impl RequestConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds headers given as `"Key: Value"` strings.
    pub fn with_header_lines<S: AsRef<str>>(mut self, lines: &[S]) -> Result<Self> {
        for line in lines {
            let (name, value) = parse_header_line(line.as_ref())?;
            self.headers.insert(name, value);
        }
        Ok(self)
    }

    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    pub fn with_certificate_validation(mut self, validate: bool) -> Self {
        self.validate_certificates = validate;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_connectivity_timeout(mut self, timeout: Duration) -> Self {
        self.connectivity_timeout = timeout;
        self
    }

    pub fn build_client(&self) -> Result<Client> {
        let mut builder = Client::builder()
            .user_agent(self.user_agent.clone())
            .default_headers(self.headers.clone())
            .timeout(self.timeout)
            .pool_max_idle_per_host(50)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(5))
            .danger_accept_invalid_certs(!self.validate_certificates);

        if let Some(ref proxy) = self.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy.as_str())?);
        }

        Ok(builder.build()?)
    }
}

/// Splits `"Key: Value"` at the first colon.
pub fn parse_header_line(line: &str) -> Result<(HeaderName, HeaderValue)> {
    let (key, value) = line
        .split_once(':')
        .ok_or_else(|| ScanError::InvalidHeader(format!("'{}' is not 'Key: Value'", line)))?;

    let name = HeaderName::from_bytes(key.trim().as_bytes())
        .map_err(|e| ScanError::InvalidHeader(format!("'{}': {}", key.trim(), e)))?;
    let value = HeaderValue::from_str(value.trim())
        .map_err(|e| ScanError::InvalidHeader(format!("'{}': {}", value.trim(), e)))?;

    Ok((name, value))
}

/// Throughput and sampling knobs of the [`Requestor`](crate::Requestor).
#[derive(Debug, Clone)]
pub struct RequestorSettings {
    /// Requests per second across the whole process.
    pub rate_limit: NonZeroU32,
    /// Maximum requests in flight during one batch.
    pub workers: usize,
    /// Samples averaged into one measurement.
    pub samples: usize,
    /// Leading samples taken and discarded before `samples`.
    pub warmup: usize,
    pub mean: MeanAlgorithm,
    /// Batches up to this size run inline instead of on the worker pool.
    pub inline_batch_limit: usize,
}

impl Default for RequestorSettings {
    fn default() -> Self {
        Self {
            rate_limit: NonZeroU32::new(200).unwrap_or(NonZeroU32::MIN),
            workers: 10,
            samples: 5,
            warmup: 0,
            mean: MeanAlgorithm::Arithmetic,
            inline_batch_limit: 3,
        }
    }
}
