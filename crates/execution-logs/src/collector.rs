// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Delivery of batches to the local collector.

use async_trait::async_trait;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::constants;
use crate::entry::Entry;
use crate::errors::{ConfigError, DeliveryError};

/// Best-effort, single-attempt transport to the collector.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Sends one batch of entries, in order. Anything but a 2xx answer within
    /// `deadline` is a failure.
    async fn deliver(&self, entries: &[Entry], deadline: Duration) -> Result<(), DeliveryError>;

    /// Tells the collector the process is about to terminate.
    async fn notify_termination(&self, deadline: Duration) -> Result<(), DeliveryError>;
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct LogPayload<'a> {
    entries: &'a [Entry],
}

/// Collector reached over plain HTTP with JSON bodies.
#[derive(Debug, Clone)]
pub struct HttpCollector {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCollector {
    /// `base_url` is the scheme and authority of the collector, e.g.
    /// `http://127.0.0.1:8091`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ConfigError::Client(e.to_string()))?;
        Ok(HttpCollector {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn post(&self, path: &str, body: Vec<u8>, deadline: Duration) -> Result<(), DeliveryError> {
        let url = format!("{}{}", self.base_url, path);
        let time = Instant::now();
        let resp = self
            .client
            .post(&url)
            .timeout(deadline)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await;
        let elapsed = time.elapsed();

        match resp {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    debug!(
                        "LOGS | Collector accepted {path} in {} ms",
                        elapsed.as_millis()
                    );
                    Ok(())
                } else {
                    debug!("LOGS | Collector answered {path} with status {status}");
                    Err(DeliveryError::Rejected(status.as_u16()))
                }
            }
            Err(e) if e.is_timeout() => Err(DeliveryError::Timeout(deadline)),
            Err(e) => Err(DeliveryError::Transport(e.to_string())),
        }
    }
}

#[async_trait]
impl Collector for HttpCollector {
    async fn deliver(&self, entries: &[Entry], deadline: Duration) -> Result<(), DeliveryError> {
        let body = serde_json::to_vec(&LogPayload { entries })
            .map_err(|e| DeliveryError::Payload(e.to_string()))?;
        self.post(constants::LOG_PATH, body, deadline).await
    }

    async fn notify_termination(&self, deadline: Duration) -> Result<(), DeliveryError> {
        self.post(constants::KILL_PATH, b"null".to_vec(), deadline)
            .await
    }
}
