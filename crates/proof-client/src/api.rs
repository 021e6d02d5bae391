//! HTTP surface of the evaluation service
//!
//! One async method per upstream endpoint, with typed request/response
//! shapes. Transport failures map to [`ClientError::Http`]; non-2xx answers
//! map to [`ClientError::Api`] carrying the status code, which the
//! orchestrator inspects for criteria rejections.

use std::time::Duration;

use proof_core::{CommentaryResult, CoreOutput, InsightResult, UsageWindow};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::ApiConfig;
use crate::error::{ClientError, Result};

// =============================================================================
// Request / Response Types
// =============================================================================

/// Payload shared by the three batch endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct BatchEvaluateRequest<'a> {
    pub campaign_id: &'a str,
    pub window: &'a UsageWindow,
    pub wallets: &'a [String],
    pub mode: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub criteria_set_id: Option<&'a str>,
}

impl<'a> BatchEvaluateRequest<'a> {
    pub fn sync(
        campaign_id: &'a str,
        window: &'a UsageWindow,
        wallets: &'a [String],
        criteria_set_id: Option<&'a str>,
    ) -> Self {
        Self {
            campaign_id,
            window,
            wallets,
            mode: "sync",
            criteria_set_id,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentaryBatchEntry {
    pub wallet: String,
    pub output: CoreOutput,
    pub insights: InsightResult,
    pub commentary: CommentaryResult,
    #[serde(default)]
    pub cached_core: bool,
    #[serde(default)]
    pub cached_insights: bool,
    #[serde(default)]
    pub cached_commentary: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InsightsBatchEntry {
    pub wallet: String,
    pub output: CoreOutput,
    pub insights: InsightResult,
    #[serde(default)]
    pub cached_core: bool,
    #[serde(default)]
    pub cached_insights: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CoreBatchEntry {
    pub wallet: String,
    pub output: CoreOutput,
    #[serde(default)]
    pub cached: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct BatchResponse<E> {
    results: Vec<E>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvaluateResponse {
    pub output: CoreOutput,
    #[serde(default)]
    pub cached: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InsightsResponse {
    pub insights: InsightResult,
    #[serde(default)]
    pub cached: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentaryResponse {
    pub commentary: CommentaryResult,
    #[serde(default)]
    pub cached: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnsResolveResponse {
    pub name: String,
    pub address: Option<String>,
    pub normalized_address: Option<String>,
    #[serde(default)]
    pub cached: bool,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
struct EvaluateSingleRequest<'a> {
    wallet: &'a str,
    campaign_id: &'a str,
    window: &'a UsageWindow,
    #[serde(skip_serializing_if = "Option::is_none")]
    criteria_set_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct InsightsSingleRequest<'a> {
    output: &'a CoreOutput,
}

#[derive(Debug, Serialize)]
struct CommentarySingleRequest<'a> {
    output: &'a CoreOutput,
    insights: &'a InsightResult,
}

// =============================================================================
// API Client
// =============================================================================

/// HTTP client for the evaluation service.
pub struct ProofApi {
    client: Client,
    base_url: String,
}

impl ProofApi {
    pub fn new(config: &ApiConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Richest batch tier: core output, insights and commentary per wallet.
    pub async fn campaign_commentary(
        &self,
        request: &BatchEvaluateRequest<'_>,
    ) -> Result<Vec<CommentaryBatchEntry>> {
        let response: BatchResponse<CommentaryBatchEntry> =
            self.post("/v1/campaign/commentary", request).await?;
        Ok(response.results)
    }

    /// Batch tier without commentary.
    pub async fn campaign_insights(
        &self,
        request: &BatchEvaluateRequest<'_>,
    ) -> Result<Vec<InsightsBatchEntry>> {
        let response: BatchResponse<InsightsBatchEntry> =
            self.post("/v1/campaign/insights", request).await?;
        Ok(response.results)
    }

    /// Core-only batch tier.
    pub async fn campaign_core(
        &self,
        request: &BatchEvaluateRequest<'_>,
    ) -> Result<Vec<CoreBatchEntry>> {
        let response: BatchResponse<CoreBatchEntry> =
            self.post("/v1/campaign/run", request).await?;
        Ok(response.results)
    }

    /// Core evaluation of a single wallet.
    pub async fn evaluate_single(
        &self,
        wallet: &str,
        campaign_id: &str,
        window: &UsageWindow,
        criteria_set_id: Option<&str>,
    ) -> Result<EvaluateResponse> {
        self.post(
            "/v1/evaluate",
            &EvaluateSingleRequest {
                wallet,
                campaign_id,
                window,
                criteria_set_id,
            },
        )
        .await
    }

    /// Remote insights for an already-evaluated wallet.
    pub async fn insights_single(&self, output: &CoreOutput) -> Result<InsightsResponse> {
        self.post("/v1/insights", &InsightsSingleRequest { output })
            .await
    }

    /// Commentary for an evaluated and scored wallet.
    pub async fn commentary_single(
        &self,
        output: &CoreOutput,
        insights: &InsightResult,
    ) -> Result<CommentaryResponse> {
        self.post("/v1/commentary", &CommentarySingleRequest { output, insights })
            .await
    }

    /// Resolve one ENS name.
    pub async fn ens_resolve(&self, name: &str) -> Result<EnsResolveResponse> {
        let url = format!("{}/v1/ens/resolve", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("name", name)])
            .send()
            .await
            .map_err(|e| ClientError::Http(e.to_string()))?;
        Self::decode(response).await
    }

    /// Sample wallets for a campaign (demo data source).
    pub async fn mock_wallets(&self, campaign_id: &str, count: usize) -> Result<Vec<String>> {
        let url = format!("{}/v1/campaign/{}/mock-wallets", self.base_url, campaign_id);
        let response = self
            .client
            .get(&url)
            .query(&[("count", count.to_string())])
            .send()
            .await
            .map_err(|e| ClientError::Http(e.to_string()))?;
        Self::decode(response).await
    }

    // HTTP helper methods

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ClientError::Http(e.to_string()))?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }
        response
            .json()
            .await
            .map_err(|e| ClientError::Http(e.to_string()))
    }
}
