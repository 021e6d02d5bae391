//! Canonical data models for proof-of-usage evaluation
//!
//! These models mirror the wire shapes of the evaluation service tiers and
//! are the single source of truth for every layer above: the batch
//! orchestrator, the per-wallet pipeline, caching, and reporting.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Usage Window
// =============================================================================

const DAY_SECONDS: i64 = 24 * 60 * 60;

/// Named usage window presets plus an explicit custom range.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum UsageWindowType {
    #[serde(rename = "last_7_days")]
    Last7Days,
    #[serde(rename = "last_14_days")]
    Last14Days,
    #[serde(rename = "last_30_days")]
    Last30Days,
    #[serde(rename = "custom")]
    Custom,
}

impl FromStr for UsageWindowType {
    type Err = CoreError;

    fn from_str(value: &str) -> CoreResult<Self> {
        match value {
            "last_7_days" => Ok(UsageWindowType::Last7Days),
            "last_14_days" => Ok(UsageWindowType::Last14Days),
            "last_30_days" => Ok(UsageWindowType::Last30Days),
            "custom" => Ok(UsageWindowType::Custom),
            other => Err(CoreError::Parse(format!("unknown window type '{other}'"))),
        }
    }
}

/// The time range a wallet's usage is judged over.
///
/// Invariant: `start < end`. Preset windows are derived from a caller-supplied
/// "now" so the same inputs always produce the same window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct UsageWindow {
    #[serde(rename = "type")]
    pub window_type: UsageWindowType,
    /// Window start, unix seconds (inclusive)
    pub start: i64,
    /// Window end, unix seconds (exclusive)
    pub end: i64,
}

impl UsageWindow {
    /// Derive a preset window ending at `now`.
    pub fn from_type(window_type: UsageWindowType, now: i64) -> CoreResult<Self> {
        let days = match window_type {
            UsageWindowType::Last7Days => 7,
            UsageWindowType::Last14Days => 14,
            UsageWindowType::Last30Days => 30,
            UsageWindowType::Custom => {
                return Err(CoreError::InvalidWindow(
                    "custom window requires explicit bounds".to_string(),
                ))
            }
        };
        Ok(Self {
            window_type,
            start: now - days * DAY_SECONDS,
            end: now,
        })
    }

    /// Build a custom window from explicit bounds.
    pub fn custom(start: i64, end: i64) -> CoreResult<Self> {
        if start >= end {
            return Err(CoreError::InvalidWindow(format!(
                "start ({start}) must be before end ({end})"
            )));
        }
        Ok(Self {
            window_type: UsageWindowType::Custom,
            start,
            end,
        })
    }
}

// =============================================================================
// Core Evaluation Output
// =============================================================================

/// Raw usage facts for a wallet within a window, as measured upstream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UsageSummary {
    pub tx_count: u64,
    pub days_active: u64,
    pub unique_contracts: u64,
}

/// Pass/fail thresholds of a criteria set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UsageCriteriaParams {
    pub min_tx_count: u64,
    pub min_days_active: u64,
    pub min_unique_contracts: u64,
}

/// The rule set a wallet was judged against, embedded in the proof for
/// auditability.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UsageCriteria {
    pub criteria_set_id: String,
    pub engine_version: String,
    pub params: UsageCriteriaParams,
}

/// Deterministic fingerprint over the evaluation output.
///
/// The same wallet, campaign, window and criteria always yield the same
/// `canonical_hash`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UsageProof {
    pub hash_algorithm: String,
    pub canonical_hash: String,
}

/// Verified evaluation result for a single wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreOutput {
    pub protocol: String,
    pub output_version: String,
    pub wallet: String,
    pub campaign_id: String,
    pub window: UsageWindow,
    pub verified_usage: bool,
    pub usage_summary: UsageSummary,
    pub criteria: UsageCriteria,
    pub proof: UsageProof,
}

// =============================================================================
// Insights & Commentary
// =============================================================================

/// Classification of a wallet's usage pattern.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorTag {
    Organic,
    SuspectedFarm,
    Inactive,
    Mixed,
}

/// Heuristic farming/organic classification derived from a [`UsageSummary`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InsightResult {
    /// 0..=100
    pub overall_score: u8,
    /// 0.0..=1.0, rounded to two decimals
    pub farming_probability: f64,
    pub behavior_tag: BehaviorTag,
    pub insight_version: String,
}

/// Best-effort human-readable commentary generated upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentaryResult {
    pub commentary_version: String,
    pub model: String,
    pub text: String,
    /// Unix seconds
    pub created_at: i64,
}

// =============================================================================
// Result Rows
// =============================================================================

/// How a wallet entered the evaluation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InputSource {
    Ens,
    Address,
}

/// The richest tier that contributed to a result row.
///
/// Ordered so that `Core < Insights < Commentary`; a row's source only ever
/// moves up.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Core,
    Insights,
    Commentary,
}

/// Per-wallet evaluation result.
///
/// Exactly one row exists per deduplicated input wallet. A populated `error`
/// with the other fields absent marks a per-wallet failure that must not
/// abort the batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletResultRow {
    pub wallet: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_source: Option<InputSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<CoreOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insights: Option<InsightResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commentary: Option<CommentaryResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_core: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_insights: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_commentary: Option<bool>,
    pub source: DataSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WalletResultRow {
    /// An error-tagged row for a wallet whose evaluation failed.
    pub fn failed(wallet: &str, message: impl Into<String>) -> Self {
        Self {
            wallet: wallet.to_string(),
            display_name: None,
            input_source: None,
            output: None,
            insights: None,
            commentary: None,
            cached_core: None,
            cached_insights: None,
            cached_commentary: None,
            source: DataSource::Core,
            error: Some(message.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

// =============================================================================
// Run Summary
// =============================================================================

/// Aggregate statistics over a run's result rows.
///
/// Always derived from the row set with [`crate::summary::summarize_rows`],
/// never stored independently.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    pub total: u64,
    pub verified_true: u64,
    pub verified_false: u64,
    pub verified_rate: f64,
    pub avg_tx_count: f64,
    pub avg_days_active: f64,
    pub avg_unique_contracts: f64,
    pub suspected_farm_count: u64,
    pub suspected_farm_rate: f64,
    pub avg_score: f64,
}
