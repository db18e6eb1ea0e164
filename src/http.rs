//! Blocking HTTP client construction and response checking.

use anyhow::{Context, Result};
use reqwest::blocking::{Client, Response};
use std::fmt;
use std::time::Duration;

use crate::config::HttpConfig;

/// Build a blocking client with the given timeout and TLS settings.
pub fn build_client(http: &HttpConfig, timeout_secs: u64) -> Result<Client> {
    let mut builder = Client::builder().timeout(Duration::from_secs(timeout_secs));

    if http.insecure_tls {
        tracing::warn!("TLS certificate verification is disabled");
        builder = builder.danger_accept_invalid_certs(true);
    }

    if let Some(ref path) = http.ca_bundle {
        let pem = std::fs::read(path)
            .with_context(|| format!("Failed to read CA bundle: {}", path.display()))?;
        let cert = reqwest::Certificate::from_pem(&pem)
            .with_context(|| format!("Invalid PEM certificate: {}", path.display()))?;
        builder = builder.add_root_certificate(cert);
    }

    Ok(builder.build()?)
}

/// Non-success HTTP response. Kept as a concrete type so callers can
/// `downcast_ref` it and branch on the status (e.g. retry on 429).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpStatusError {
    pub service: String,
    pub status: u16,
    /// First 400 characters of the response body.
    pub body: String,
}

impl HttpStatusError {
    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }
}

impl fmt::Display for HttpStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} HTTP error {}: {}", self.service, self.status, self.body)
    }
}

impl std::error::Error for HttpStatusError {}

/// Pass successful responses through; turn anything else into an
/// [`HttpStatusError`].
pub fn check_status(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(HttpStatusError {
        service: what.to_string(),
        status: status.as_u16(),
        body: truncate_chars(&body, 400),
    }
    .into())
}

/// Whether `err` wraps an HTTP 429.
pub fn is_rate_limited(err: &anyhow::Error) -> bool {
    err.downcast_ref::<HttpStatusError>()
        .map(HttpStatusError::is_rate_limited)
        .unwrap_or(false)
}

/// First `max` characters of `s`.
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
