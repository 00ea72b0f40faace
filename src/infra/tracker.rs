// ============================================================
// Layer 6 — Remote Experiment Tracker
// ============================================================
// Optionally streams per-epoch losses to an experiment
// tracking service so runs can be watched from a dashboard.
//
// Each epoch is one JSON POST:
//
//   POST <endpoint>
//   Authorization: Bearer <api key>
//   {"tag": "...", "session": "...", "epoch": 3,
//    "train_loss": 0.05, "val_loss": 0.06}
//
// The service is a convenience: network failures are logged
// and training carries on.

use anyhow::{Context, Result};
use serde::Serialize;
use std::time::Duration;

use crate::domain::traits::{EpochMetrics, ExperimentTracker};

#[derive(Debug, Serialize)]
struct EpochPayload<'a> {
    tag:        &'a str,
    session:    &'a str,
    epoch:      usize,
    train_loss: f64,
    val_loss:   f64,
}

pub struct RemoteTracker {
    client:   reqwest::blocking::Client,
    endpoint: String,
    api_key:  String,
    tag:      String,
    session:  String,
    failures: usize,
}

impl RemoteTracker {
    pub fn new(
        endpoint: impl Into<String>,
        api_key:  impl Into<String>,
        tag:      impl Into<String>,
        session:  impl Into<String>,
    ) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Cannot build HTTP client for experiment tracking")?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key:  api_key.into(),
            tag:      tag.into(),
            session:  session.into(),
            failures: 0,
        })
    }

    /// Number of epochs that could not be delivered.
    pub fn failures(&self) -> usize {
        self.failures
    }

    fn send(&self, m: &EpochMetrics) -> Result<()> {
        let payload = EpochPayload {
            tag:        &self.tag,
            session:    &self.session,
            epoch:      m.epoch,
            train_loss: m.train_loss,
            val_loss:   m.val_loss,
        };
        self.client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()?
            .error_for_status()?;
        Ok(())
    }
}

impl ExperimentTracker for RemoteTracker {
    fn log_epoch(&mut self, m: &EpochMetrics) -> Result<()> {
        if let Err(e) = self.send(m) {
            self.failures += 1;
            tracing::warn!("Experiment tracker: epoch {} not delivered: {:#}", m.epoch, e);
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.failures > 0 {
            tracing::warn!("Experiment tracker missed {} epochs", self.failures);
        }
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreachable_endpoint_is_not_fatal() {
        // port 9 (discard) on localhost refuses connections
        let mut tracker = RemoteTracker::new("http://127.0.0.1:9/epochs", "key", "test", "s1").unwrap();
        assert!(tracker.log_epoch(&EpochMetrics::new(1, 0.1, 0.2)).is_ok());
        assert_eq!(tracker.failures(), 1);
        assert!(tracker.finish().is_ok());
    }

    #[test]
    fn test_payload_shape() {
        let p = EpochPayload { tag: "t", session: "s", epoch: 2, train_loss: 0.5, val_loss: 0.25 };
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v["epoch"], 2);
        assert_eq!(v["val_loss"], 0.25);
    }
}
