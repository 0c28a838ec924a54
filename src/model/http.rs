//! Client for a sequence model served over HTTP.
//!
//! The server exposes a single endpoint:
//!
//! ```text
//! POST {base_url}/sample
//! { "observed": [[x, y], ...], "reference": [[x, y], ...], "steps": n }
//! -> { "trajectory": [[x, y], ...] }
//! ```
//!
//! The returned trajectory is the observed prefix followed by `n`
//! predictions, all in normalized coordinates.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::sampler::Sampler;
use crate::dataset::Point;

/// Body of a `/sample` request.
#[derive(Debug, Clone, Serialize)]
pub struct SampleRequest<'a> {
    pub observed: &'a [Point],
    pub reference: &'a [Point],
    pub steps: usize,
}

/// Body of a `/sample` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleResponse {
    pub trajectory: Vec<Point>,
}

/// HTTP client for a remote sequence model.
#[derive(Debug, Clone)]
pub struct HttpSampler {
    base_url: String,
    http: reqwest::Client,
}

impl HttpSampler {
    /// Create a client for the model server at `base_url`
    /// (e.g. `"http://localhost:8500"`).
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn sample_url(&self) -> String {
        format!("{}/sample", self.base_url)
    }
}

impl Sampler for HttpSampler {
    async fn sample(
        &self,
        observed: &[Point],
        reference: &[Point],
        steps: usize,
    ) -> Result<Vec<Point>> {
        let url = self.sample_url();
        debug!(%url, observed = observed.len(), steps, "sending sample request");

        let body = SampleRequest {
            observed,
            reference,
            steps,
        };

        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("failed to send sample request")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("model server returned {status}: {text}");
        }

        let parsed: SampleResponse = resp
            .json()
            .await
            .context("failed to parse sample response")?;

        info!(
            steps,
            returned = parsed.trajectory.len(),
            "sample request succeeded"
        );
        Ok(parsed.trajectory)
    }

    fn name(&self) -> &str {
        "http"
    }
}
