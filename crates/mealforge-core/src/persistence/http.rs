use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;

use super::signing::{SigningKey, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use super::{CompletionRequest, CompletionResponse, PlanStore};
use crate::notify::ProgressEvent;
use crate::sanitize::truncate_snippet;

/// Longest response body quoted in an error.
const MAX_ERROR_BODY: usize = 300;

/// Client for the persistence service: `POST /plan/progress` and
/// `POST /plan/complete`, both HMAC-signed.
#[derive(Debug, Clone)]
pub struct HttpPlanStore {
    client: reqwest::Client,
    base_url: String,
    key: SigningKey,
}

impl HttpPlanStore {
    pub fn new(base_url: &str, key: SigningKey, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build persistence HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            key,
        })
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<reqwest::Response> {
        let url = format!("{}{path}", self.base_url);
        let bytes = serde_json::to_vec(body).with_context(|| format!("failed to encode {path}"))?;
        let timestamp = Utc::now().timestamp_millis();
        let signature = self.key.sign(timestamp, &bytes);

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(TIMESTAMP_HEADER, timestamp.to_string())
            .header(SIGNATURE_HEADER, signature)
            .body(bytes)
            .send()
            .await
            .with_context(|| format!("failed to POST {path}"))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "{path} returned {status}: {}",
                truncate_snippet(&text, MAX_ERROR_BODY)
            );
        }
        Ok(response)
    }
}

#[async_trait]
impl PlanStore for HttpPlanStore {
    fn name(&self) -> &str {
        "http-persistence"
    }

    async fn report_progress(&self, event: &ProgressEvent) -> Result<()> {
        self.post("/plan/progress", event).await?;
        Ok(())
    }

    async fn complete_plan(&self, request: &CompletionRequest) -> Result<String> {
        let response = self.post("/plan/complete", request).await?;
        let body: CompletionResponse = response
            .json()
            .await
            .with_context(|| format!("failed to decode completion response for job {}", request.job_id))?;
        Ok(body.plan_id)
    }
}
