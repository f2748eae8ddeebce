use std::collections::HashMap;
use std::fmt;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::feed::snapshot::{RatePoint, Snapshot};

#[derive(Debug)]
pub enum FetchError {
    /// Transport-level failure (connect, DNS, body read).
    Network(reqwest::Error),
    /// Provider answered with a non-success status.
    BadStatus(StatusCode),
    /// Response body did not match the provider schema.
    Malformed(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Network(e) => write!(f, "network error: {}", e),
            FetchError::BadStatus(status) => write!(f, "unexpected response status: {}", status),
            FetchError::Malformed(msg) => write!(f, "malformed provider response: {}", msg),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Network(e) => Some(e),
            _ => None,
        }
    }
}

/// Anything that can produce one fresh snapshot per call. The polling loop is
/// generic over this so tests can substitute a scripted source.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch(&self) -> Result<Snapshot, FetchError>;
}

// Provider schema: {"Valute": {"USD": {"Value": 90.0, "Previous": 89.5, ...}}}
// Extra per-instrument fields are ignored; a missing Value/Previous or a
// different top-level shape is malformed.
#[derive(Debug, Deserialize)]
struct ProviderRate {
    #[serde(rename = "Value")]
    value: f64,
    #[serde(rename = "Previous")]
    previous: f64,
}

#[derive(Debug, Deserialize)]
struct ProviderPayload {
    #[serde(rename = "Valute")]
    valute: HashMap<String, ProviderRate>,
}

/// Fetches the daily rates document over HTTP and normalizes it.
pub struct RateFetcher {
    client: reqwest::Client,
    url: String,
}

impl RateFetcher {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    /// Parses a raw provider body into a normalized snapshot.
    pub fn parse_payload(body: &str) -> Result<Snapshot, FetchError> {
        let payload: ProviderPayload =
            serde_json::from_str(body).map_err(|e| FetchError::Malformed(e.to_string()))?;

        Ok(payload
            .valute
            .into_iter()
            .map(|(code, rate)| {
                (
                    code,
                    RatePoint {
                        current: rate.value,
                        previous: rate.previous,
                    },
                )
            })
            .collect())
    }
}

#[async_trait]
impl SnapshotSource for RateFetcher {
    /// One GET against the provider, no retries. Never touches shared state;
    /// retry policy lives entirely in the polling loop.
    async fn fetch(&self) -> Result<Snapshot, FetchError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(FetchError::Network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::BadStatus(status));
        }

        let body = response.text().await.map_err(FetchError::Network)?;
        Self::parse_payload(&body)
    }
}
