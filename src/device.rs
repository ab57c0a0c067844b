//! Outbound fan speed commands for the air cleaner device.
//!
//! A dispatch is at-most-one-attempt: one POST with a hard timeout, no retry
//! and no queueing. Failures are captured as data and handed back to the
//! caller; a reading that is already stored is never rolled back because the
//! device could not be reached.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::Config;

// ---

const DISPATCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of one dispatch attempt, embedded verbatim in API responses.
///
/// `ok == false` is a reportable condition, not an error: ingestion still
/// succeeds and the stored reading/score are untouched.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchOutcome {
    // ---
    pub ok: bool,
    pub status: Option<u16>,
    pub detail: String,
}

/// HTTP client for the cleaner's speed endpoint.
///
/// Holds the shared-secret credential and a client with the dispatch timeout
/// baked in; constructed once at startup from [`Config`].
#[derive(Debug, Clone)]
pub struct SpeedDispatcher {
    // ---
    client: reqwest::Client,
    url: String,
    key: String,
}

impl SpeedDispatcher {
    /// Build the dispatcher, failing startup if the HTTP client cannot be
    /// constructed: a client without the timeout would break the bounded-call
    /// contract.
    pub fn new(cfg: &Config) -> Result<Self> {
        // ---
        let client = reqwest::Client::builder()
            .timeout(DISPATCH_TIMEOUT)
            .build()
            .context("failed to build device HTTP client")?;

        Ok(SpeedDispatcher {
            client,
            url: cfg.device_api_url.clone(),
            key: cfg.device_api_key.clone(),
        })
    }

    /// Send one speed command to the device.
    ///
    /// The speed is validated locally first; an out-of-range value fails
    /// without touching the network. Transport failures, timeouts and
    /// non-2xx responses all come back as `ok == false`.
    pub async fn dispatch(&self, speed: i64) -> DispatchOutcome {
        // ---
        if !(0..=3).contains(&speed) {
            return DispatchOutcome {
                ok: false,
                status: None,
                detail: "speed must be an integer 0~3".to_string(),
            };
        }

        info!("Dispatching device speed {}", speed);

        let result = self
            .client
            .post(&self.url)
            .header("device_key", &self.key)
            .json(&json!({ "speed": speed }))
            .send()
            .await;

        match result {
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                if status.is_success() {
                    info!("Device accepted speed {}: status={}", speed, status);
                } else {
                    warn!("Device rejected speed {}: status={} body={}", speed, status, body);
                }
                DispatchOutcome {
                    ok: status.is_success(),
                    status: Some(status.as_u16()),
                    detail: body,
                }
            }
            Err(e) => {
                warn!("Device dispatch failed: {}", e);
                DispatchOutcome {
                    ok: false,
                    status: None,
                    detail: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn test_dispatcher() -> SpeedDispatcher {
        // ---
        let cfg = Config {
            db_url: "postgres://unused".into(),
            db_pool_max: 1,
            device_api_url: "http://127.0.0.1:1/speed".into(),
            device_api_key: "secret".into(),
            station_api_url: "http://127.0.0.1:1/station".into(),
            station_api_key: "secret".into(),
            station_name: "test-station".into(),
            poll_interval_secs: 3600,
        };
        SpeedDispatcher::new(&cfg).unwrap()
    }

    #[tokio::test]
    async fn test_out_of_range_speed_fails_locally() {
        // ---
        let d = test_dispatcher();

        // No server is listening; a network attempt would produce a
        // transport error detail instead of the validation message.
        for speed in [-1, 4, 99] {
            let outcome = d.dispatch(speed).await;
            assert!(!outcome.ok);
            assert_eq!(outcome.status, None);
            assert_eq!(outcome.detail, "speed must be an integer 0~3");
        }
    }

    #[tokio::test]
    async fn test_transport_failure_is_captured_not_raised() {
        // ---
        let d = test_dispatcher();

        // Port 1 refuses connections; the failure must come back as a value.
        let outcome = d.dispatch(2).await;
        assert!(!outcome.ok);
        assert_eq!(outcome.status, None);
        assert!(!outcome.detail.is_empty());
    }
}
