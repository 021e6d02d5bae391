//! Per-wallet evaluation pipeline
//!
//! The lowest fallback tier: core evaluate, then insights, then commentary,
//! one wallet at a time. Core evaluation is mandatory; the optional stages
//! degrade gracefully, keeping the locally-computed insight score and
//! leaving commentary absent. Only cancellation escapes as an error, every
//! other failure lands in the row's `error` field.

use std::sync::Arc;

use proof_core::{
    compute_insight, CommentaryResult, CoreOutput, DataSource, InsightResult, UsageWindow,
    WalletResultRow,
};
use tokio_util::sync::CancellationToken;

use crate::api::ProofApi;
use crate::batch::with_cancel;
use crate::cache::EvalCache;
use crate::error::{ClientError, Result};

pub struct WalletPipeline {
    api: Arc<ProofApi>,
    cache: EvalCache,
    campaign_id: String,
    window: UsageWindow,
    criteria_set_id: Option<String>,
}

impl WalletPipeline {
    pub fn new(
        api: Arc<ProofApi>,
        cache: EvalCache,
        campaign_id: impl Into<String>,
        window: UsageWindow,
        criteria_set_id: Option<String>,
    ) -> Self {
        Self {
            api,
            cache,
            campaign_id: campaign_id.into(),
            window,
            criteria_set_id,
        }
    }

    /// Evaluate one wallet through all three stages.
    ///
    /// `source` upgrades monotonically: `core` after (a), `insights` only if
    /// (b) succeeds, `commentary` only if (c) succeeds.
    pub async fn run(
        &self,
        wallet: String,
        cancel: &CancellationToken,
    ) -> Result<WalletResultRow> {
        if cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }

        let (output, cached_core) = match self.evaluate_core(&wallet, cancel).await {
            Ok(pair) => pair,
            Err(err) if err.is_cancelled() => return Err(err),
            Err(err) => {
                tracing::debug!(wallet = %wallet, error = %err, "core evaluation failed");
                return Ok(WalletResultRow::failed(&wallet, err.to_string()));
            }
        };

        let mut insights = compute_insight(&output.usage_summary);
        let mut cached_insights = false;
        let mut source = DataSource::Core;
        match self.fetch_insights(&output, cancel).await {
            Ok((remote, cached)) => {
                insights = remote;
                cached_insights = cached;
                source = DataSource::Insights;
            }
            Err(err) if err.is_cancelled() => return Err(err),
            Err(err) => {
                tracing::debug!(wallet = %wallet, error = %err, "insights unavailable, keeping local score");
            }
        }

        let mut commentary = None;
        let mut cached_commentary = None;
        match self.fetch_commentary(&output, &insights, cancel).await {
            Ok((result, cached)) => {
                commentary = Some(result);
                cached_commentary = Some(cached);
                source = DataSource::Commentary;
            }
            Err(err) if err.is_cancelled() => return Err(err),
            Err(err) => {
                tracing::debug!(wallet = %wallet, error = %err, "commentary unavailable");
            }
        }

        Ok(WalletResultRow {
            wallet,
            display_name: None,
            input_source: None,
            output: Some(output),
            insights: Some(insights),
            commentary,
            cached_core: Some(cached_core),
            cached_insights: Some(cached_insights),
            cached_commentary,
            source,
            error: None,
        })
    }

    async fn evaluate_core(
        &self,
        wallet: &str,
        cancel: &CancellationToken,
    ) -> Result<(CoreOutput, bool)> {
        let criteria = self.criteria_set_id.as_deref();
        if let Some(hit) = self
            .cache
            .get_core(wallet, &self.campaign_id, &self.window, criteria)
            .await
        {
            return Ok((hit, true));
        }

        let response = match criteria {
            Some(criteria_set_id) => {
                let attempt = with_cancel(
                    cancel,
                    self.api.evaluate_single(
                        wallet,
                        &self.campaign_id,
                        &self.window,
                        Some(criteria_set_id),
                    ),
                )
                .await;
                match attempt {
                    Ok(response) => response,
                    Err(err) if err.is_cancelled() => return Err(err),
                    Err(err) if err.is_criteria_rejection() => {
                        tracing::debug!(
                            wallet = %wallet,
                            criteria_set_id = %criteria_set_id,
                            error = %err,
                            "criteria set rejected, retrying without it"
                        );
                        with_cancel(
                            cancel,
                            self.api
                                .evaluate_single(wallet, &self.campaign_id, &self.window, None),
                        )
                        .await?
                    }
                    Err(err) => return Err(err),
                }
            }
            None => {
                with_cancel(
                    cancel,
                    self.api
                        .evaluate_single(wallet, &self.campaign_id, &self.window, None),
                )
                .await?
            }
        };

        self.cache
            .put_core(&self.campaign_id, &self.window, criteria, response.output.clone())
            .await;
        Ok((response.output, response.cached))
    }

    async fn fetch_insights(
        &self,
        output: &CoreOutput,
        cancel: &CancellationToken,
    ) -> Result<(InsightResult, bool)> {
        let hash = &output.proof.canonical_hash;
        if let Some(hit) = self.cache.get_insights(hash).await {
            return Ok((hit, true));
        }
        let response = with_cancel(cancel, self.api.insights_single(output)).await?;
        self.cache.put_insights(hash, response.insights.clone()).await;
        Ok((response.insights, response.cached))
    }

    async fn fetch_commentary(
        &self,
        output: &CoreOutput,
        insights: &InsightResult,
        cancel: &CancellationToken,
    ) -> Result<(CommentaryResult, bool)> {
        let hash = &output.proof.canonical_hash;
        if let Some(hit) = self.cache.get_commentary(hash).await {
            return Ok((hit, true));
        }
        let response = with_cancel(cancel, self.api.commentary_single(output, insights)).await?;
        self.cache
            .put_commentary(hash, response.commentary.clone())
            .await;
        Ok((response.commentary, response.cached))
    }
}
