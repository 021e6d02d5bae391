//! Fallback insight scoring
//!
//! A deterministic farming/organic classifier over raw usage facts. This is
//! the local stand-in for the remote insights tier: whenever that tier is
//! unreachable the orchestrator fills insight fields from here, so the math
//! must stay reproducible down to the rounding rule. Downstream filtering
//! and sorting depend on these exact numbers.

use crate::models::{BehaviorTag, InsightResult, UsageSummary};

pub const INSIGHT_VERSION: &str = "v1";

// Normalization caps: activity at or above these counts saturates the
// corresponding component.
const TX_COUNT_CAP: f64 = 120.0;
const DAYS_ACTIVE_CAP: f64 = 30.0;
const UNIQUE_CONTRACTS_CAP: f64 = 20.0;

fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}

fn round_to_2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Score a wallet's usage summary.
///
/// Rounding is half-away-from-zero (`f64::round`); all inputs are
/// non-negative so this matches the service's scoring engine bit for bit.
pub fn compute_insight(usage: &UsageSummary) -> InsightResult {
    let tx_n = clamp(usage.tx_count as f64 / TX_COUNT_CAP, 0.0, 1.0);
    let days_n = clamp(usage.days_active as f64 / DAYS_ACTIVE_CAP, 0.0, 1.0);
    let uniq_n = clamp(usage.unique_contracts as f64 / UNIQUE_CONTRACTS_CAP, 0.0, 1.0);

    let activity = clamp(0.45 * days_n + 0.35 * tx_n + 0.20 * uniq_n, 0.0, 1.0);
    let farm_raw = clamp(
        0.55 * tx_n + 0.25 * (1.0 - uniq_n) + 0.20 * (1.0 - days_n),
        0.0,
        1.0,
    );

    let behavior_tag = if usage.tx_count < 3 && usage.days_active < 2 {
        BehaviorTag::Inactive
    } else if farm_raw >= 0.65 && usage.unique_contracts <= 2 {
        BehaviorTag::SuspectedFarm
    } else if activity >= 0.70 && farm_raw < 0.55 {
        BehaviorTag::Organic
    } else {
        BehaviorTag::Mixed
    };

    let overall_score = clamp(activity * 100.0 - farm_raw * 35.0, 0.0, 100.0).round() as u8;

    InsightResult {
        overall_score,
        farming_probability: round_to_2(farm_raw),
        behavior_tag,
        insight_version: INSIGHT_VERSION.to_string(),
    }
}
