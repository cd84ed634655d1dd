//! Batch delivery to the remote collector
//!
//! The scheduler only cares whether a batch was delivered. Every failure
//! mode (non-2xx status, connection error, timeout) collapses into
//! [`DeliveryOutcome::Failed`].

use std::future::Future;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tracing::{debug, warn};

use crate::error::AnalyticsResult;

/// Result of one delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Failed,
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered)
    }
}

/// Sends one serialized batch and reports whether it was accepted
pub trait Transport: Send + Sync + 'static {
    fn send(&self, body: String, timeout: Duration) -> impl Future<Output = DeliveryOutcome> + Send;
}

/// Transport that POSTs batches as JSON over HTTP
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    url: String,
}

impl HttpTransport {
    /// Create a transport posting to `url`
    pub fn new(url: impl Into<String>) -> AnalyticsResult<Self> {
        let client = Client::builder().build()?;
        Ok(Self::with_client(client, url))
    }

    /// Create a transport reusing an existing client
    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Transport for HttpTransport {
    async fn send(&self, body: String, timeout: Duration) -> DeliveryOutcome {
        let result = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .timeout(timeout)
            .body(body)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                debug!(status = %response.status(), "Collector accepted batch");
                DeliveryOutcome::Delivered
            }
            Ok(response) => {
                warn!(status = %response.status(), url = %self.url, "Collector rejected batch");
                DeliveryOutcome::Failed
            }
            Err(e) => {
                warn!(error = %e, url = %self.url, timed_out = e.is_timeout(), "Failed to send events");
                DeliveryOutcome::Failed
            }
        }
    }
}
