//! Tiered evaluation orchestration
//!
//! The central control flow: an explicit ordered list of batch strategies
//! (commentary, insights, core) walked in descending richness, with the
//! per-wallet pipeline as the last resort. A non-cancellation failure falls
//! through to the next tier; a success stops the walk immediately. A 4xx
//! while a criteria set is attached retries the same tier once without it,
//! distinguishing "criteria not supported" from "tier unavailable".
//!
//! After any batch success the server rows are re-projected onto the
//! requested wallet order, so the output list always has one row per input
//! wallet regardless of what the server returned.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use proof_core::{
    compute_insight, summarize_rows, DataSource, RunSummary, UsageWindow, WalletResultRow,
};
use tokio_util::sync::CancellationToken;

use crate::api::{BatchEvaluateRequest, ProofApi};
use crate::batch::{run_batch, with_cancel, ProgressFn};
use crate::cache::EvalCache;
use crate::config::{AppConfig, EvaluationConfig};
use crate::ens::{EnsGateway, WalletMeta};
use crate::error::{ClientError, Result};
use crate::pipeline::WalletPipeline;

// =============================================================================
// Request / Outcome
// =============================================================================

/// One evaluation run over a deduplicated wallet list.
#[derive(Debug, Clone)]
pub struct EvaluationRequest {
    /// Lowercase wallet addresses, already deduplicated
    pub wallets: Vec<String>,
    pub campaign_id: String,
    pub window: UsageWindow,
    pub criteria_set_id: Option<String>,
    /// Display metadata per lowercase address, stamped onto result rows
    pub meta: HashMap<String, WalletMeta>,
}

impl EvaluationRequest {
    pub fn new(wallets: Vec<String>, campaign_id: impl Into<String>, window: UsageWindow) -> Self {
        Self {
            wallets,
            campaign_id: campaign_id.into(),
            window,
            criteria_set_id: None,
            meta: HashMap::new(),
        }
    }
}

/// Final result of a run: one row per requested wallet, in request order.
#[derive(Debug, Clone)]
pub struct EvaluationOutcome {
    pub rows: Vec<WalletResultRow>,
    pub source: DataSource,
    pub summary: RunSummary,
}

/// Caller-owned handle to a running evaluation.
///
/// `cancel` is idempotent and safe after completion.
#[derive(Clone)]
pub struct RunHandle {
    token: CancellationToken,
}

impl RunHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The run's cancellation scope, for collaborators that take a token
    /// (e.g. the ENS gateway).
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

// =============================================================================
// Batch Tiers
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchTier {
    Commentary,
    Insights,
    Core,
}

impl BatchTier {
    /// Descending richness; the walk stops at the first success.
    const ORDER: [BatchTier; 3] = [BatchTier::Commentary, BatchTier::Insights, BatchTier::Core];

    fn source(self) -> DataSource {
        match self {
            BatchTier::Commentary => DataSource::Commentary,
            BatchTier::Insights => DataSource::Insights,
            BatchTier::Core => DataSource::Core,
        }
    }

    fn name(self) -> &'static str {
        match self {
            BatchTier::Commentary => "commentary",
            BatchTier::Insights => "insights",
            BatchTier::Core => "core",
        }
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

pub struct Orchestrator {
    api: Arc<ProofApi>,
    cache: EvalCache,
    evaluation: EvaluationConfig,
    /// Token of the currently active run; replaced (and cancelled) by
    /// `start_run`
    active: Mutex<CancellationToken>,
}

impl Orchestrator {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            api: Arc::new(ProofApi::new(&config.api)),
            cache: EvalCache::new(&config.cache),
            evaluation: config.evaluation.clone(),
            active: Mutex::new(CancellationToken::new()),
        }
    }

    /// An ENS gateway sharing this orchestrator's API client and caches.
    pub fn ens_gateway(&self) -> EnsGateway {
        EnsGateway::new(
            Arc::clone(&self.api),
            self.cache.clone(),
            self.evaluation.ens_concurrency,
        )
    }

    /// Sample wallets for a campaign (demo data source).
    pub async fn fetch_mock_wallets(
        &self,
        campaign_id: &str,
        count: usize,
    ) -> Result<Vec<String>> {
        self.api.mock_wallets(campaign_id, count).await
    }

    /// Begin a new run, cancelling any run still in flight. At most one run
    /// per orchestrator is ever active.
    pub fn start_run(&self) -> RunHandle {
        let token = CancellationToken::new();
        let previous = {
            let mut active = self.active.lock().expect("active-run lock poisoned");
            std::mem::replace(&mut *active, token.clone())
        };
        previous.cancel();
        RunHandle { token }
    }

    /// Evaluate every wallet in the request.
    ///
    /// Resolves with one row per wallet (per-wallet failures embedded) or
    /// rejects with [`ClientError::Cancelled`]; already-computed rows are
    /// never lost to a partial throw.
    pub async fn evaluate(
        &self,
        request: &EvaluationRequest,
        handle: &RunHandle,
        mut on_progress: Option<ProgressFn<'_>>,
    ) -> Result<EvaluationOutcome> {
        let cancel = handle.token();
        if request.wallets.is_empty() {
            return Ok(EvaluationOutcome {
                rows: Vec::new(),
                source: DataSource::Core,
                summary: RunSummary::default(),
            });
        }
        if cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }

        for tier in BatchTier::ORDER {
            match self.try_batch_tier(tier, request, cancel).await {
                Ok(rows) => {
                    let rows = reconcile_rows(&request.wallets, rows, &request.meta);
                    // One round trip: progress jumps straight to done.
                    if let Some(progress) = on_progress.as_mut() {
                        progress(request.wallets.len());
                    }
                    if self.evaluation.verify_determinism {
                        self.spot_check_determinism(request, &rows, cancel).await;
                    }
                    let summary = summarize_rows(&rows);
                    tracing::info!(
                        tier = tier.name(),
                        rows = rows.len(),
                        "batch tier succeeded"
                    );
                    return Ok(EvaluationOutcome {
                        rows,
                        source: tier.source(),
                        summary,
                    });
                }
                Err(err) if err.is_cancelled() => return Err(err),
                Err(err) => {
                    tracing::debug!(
                        tier = tier.name(),
                        error = %err,
                        "batch tier unavailable, falling back"
                    );
                }
            }
        }

        tracing::info!(
            wallets = request.wallets.len(),
            concurrency = self.evaluation.concurrency,
            "all batch tiers unavailable, running per-wallet pipeline"
        );
        let pipeline = WalletPipeline::new(
            Arc::clone(&self.api),
            self.cache.clone(),
            request.campaign_id.clone(),
            request.window,
            request.criteria_set_id.clone(),
        );
        let rows = run_batch(
            request.wallets.clone(),
            self.evaluation.concurrency,
            cancel,
            |wallet, _index| pipeline.run(wallet, cancel),
            |wallet, err| WalletResultRow::failed(wallet, err.to_string()),
            on_progress,
        )
        .await?;

        let rows = reconcile_rows(&request.wallets, rows, &request.meta);
        let source = source_from_rows(&rows);
        let summary = summarize_rows(&rows);
        Ok(EvaluationOutcome {
            rows,
            source,
            summary,
        })
    }

    async fn try_batch_tier(
        &self,
        tier: BatchTier,
        request: &EvaluationRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<WalletResultRow>> {
        let criteria = request.criteria_set_id.as_deref();
        match self.call_batch_tier(tier, request, criteria, cancel).await {
            Err(err) if criteria.is_some() && err.is_criteria_rejection() => {
                tracing::debug!(
                    tier = tier.name(),
                    error = %err,
                    "criteria set rejected, retrying tier without it"
                );
                self.call_batch_tier(tier, request, None, cancel).await
            }
            other => other,
        }
    }

    async fn call_batch_tier(
        &self,
        tier: BatchTier,
        request: &EvaluationRequest,
        criteria: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<WalletResultRow>> {
        let payload = BatchEvaluateRequest::sync(
            &request.campaign_id,
            &request.window,
            &request.wallets,
            criteria,
        );

        match tier {
            BatchTier::Commentary => {
                let entries =
                    with_cancel(cancel, self.api.campaign_commentary(&payload)).await?;
                Ok(entries
                    .into_iter()
                    .map(|entry| WalletResultRow {
                        wallet: entry.wallet,
                        display_name: None,
                        input_source: None,
                        output: Some(entry.output),
                        insights: Some(entry.insights),
                        commentary: Some(entry.commentary),
                        cached_core: Some(entry.cached_core),
                        cached_insights: Some(entry.cached_insights),
                        cached_commentary: Some(entry.cached_commentary),
                        source: DataSource::Commentary,
                        error: None,
                    })
                    .collect())
            }
            BatchTier::Insights => {
                let entries = with_cancel(cancel, self.api.campaign_insights(&payload)).await?;
                Ok(entries
                    .into_iter()
                    .map(|entry| WalletResultRow {
                        wallet: entry.wallet,
                        display_name: None,
                        input_source: None,
                        output: Some(entry.output),
                        insights: Some(entry.insights),
                        commentary: None,
                        cached_core: Some(entry.cached_core),
                        cached_insights: Some(entry.cached_insights),
                        cached_commentary: None,
                        source: DataSource::Insights,
                        error: None,
                    })
                    .collect())
            }
            BatchTier::Core => {
                let entries = with_cancel(cancel, self.api.campaign_core(&payload)).await?;
                Ok(entries
                    .into_iter()
                    .map(|entry| {
                        let insights = compute_insight(&entry.output.usage_summary);
                        WalletResultRow {
                            wallet: entry.wallet,
                            display_name: None,
                            input_source: None,
                            output: Some(entry.output),
                            insights: Some(insights),
                            commentary: None,
                            cached_core: Some(entry.cached),
                            cached_insights: Some(false),
                            cached_commentary: None,
                            source: DataSource::Core,
                            error: None,
                        }
                    })
                    .collect())
            }
        }
    }

    /// Re-evaluate the first usable row and warn when the proof hash does
    /// not reproduce. Best effort; never fails the run.
    async fn spot_check_determinism(
        &self,
        request: &EvaluationRequest,
        rows: &[WalletResultRow],
        cancel: &CancellationToken,
    ) {
        let Some((row, output)) = rows.iter().find_map(|row| {
            if row.error.is_none() {
                row.output.as_ref().map(|output| (row, output))
            } else {
                None
            }
        }) else {
            return;
        };

        let attempt = with_cancel(
            cancel,
            self.api.evaluate_single(
                &row.wallet,
                &request.campaign_id,
                &request.window,
                request.criteria_set_id.as_deref(),
            ),
        )
        .await;

        match attempt {
            Ok(response) => {
                if response.output.proof.canonical_hash != output.proof.canonical_hash {
                    tracing::warn!(
                        wallet = %row.wallet,
                        batch_hash = %output.proof.canonical_hash,
                        single_hash = %response.output.proof.canonical_hash,
                        "canonical hash did not reproduce on re-evaluation"
                    );
                }
            }
            Err(err) if err.is_cancelled() => {}
            Err(err) => {
                tracing::debug!(error = %err, "determinism spot check skipped");
            }
        }
    }
}

/// Key server rows by lowercased wallet and re-project them onto the
/// requested order, synthesizing an error row for any wallet the server
/// dropped. Output length always equals input length.
fn reconcile_rows(
    wallets: &[String],
    rows: Vec<WalletResultRow>,
    meta: &HashMap<String, WalletMeta>,
) -> Vec<WalletResultRow> {
    let mut by_wallet: HashMap<String, WalletResultRow> = rows
        .into_iter()
        .map(|row| (row.wallet.to_lowercase(), row))
        .collect();

    wallets
        .iter()
        .map(|wallet| {
            let key = wallet.to_lowercase();
            let mut row = by_wallet
                .remove(&key)
                .unwrap_or_else(|| WalletResultRow::failed(wallet, "Missing result."));
            if let Some(meta) = meta.get(&key) {
                row.display_name = meta.display_name.clone();
                row.input_source = Some(meta.input_source);
            }
            row
        })
        .collect()
}

fn source_from_rows(rows: &[WalletResultRow]) -> DataSource {
    rows.iter()
        .map(|row| row.source)
        .max()
        .unwrap_or(DataSource::Core)
}
