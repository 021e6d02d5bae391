//! Run-summary reduction
//!
//! Aggregates per-wallet result rows into run-level statistics. Error rows
//! are excluded; the summary is recomputed whenever the row set changes.

use crate::models::{BehaviorTag, RunSummary, WalletResultRow};

/// Reduce a row set into aggregate statistics.
///
/// Only rows with a core output count toward `total`; insight-derived stats
/// are averaged over the same denominator.
pub fn summarize_rows(rows: &[WalletResultRow]) -> RunSummary {
    let evaluated: Vec<&WalletResultRow> = rows
        .iter()
        .filter(|row| row.error.is_none() && row.output.is_some())
        .collect();

    let total = evaluated.len() as u64;
    if total == 0 {
        return RunSummary::default();
    }

    let mut verified_true = 0u64;
    let mut tx_sum = 0u64;
    let mut days_sum = 0u64;
    let mut uniq_sum = 0u64;
    let mut suspected_farm_count = 0u64;
    let mut score_sum = 0u64;

    for row in &evaluated {
        let output = row.output.as_ref().expect("filtered on output presence");
        if output.verified_usage {
            verified_true += 1;
        }
        tx_sum += output.usage_summary.tx_count;
        days_sum += output.usage_summary.days_active;
        uniq_sum += output.usage_summary.unique_contracts;

        if let Some(insights) = &row.insights {
            if insights.behavior_tag == BehaviorTag::SuspectedFarm {
                suspected_farm_count += 1;
            }
            score_sum += u64::from(insights.overall_score);
        }
    }

    let denom = total as f64;
    RunSummary {
        total,
        verified_true,
        verified_false: total - verified_true,
        verified_rate: verified_true as f64 / denom,
        avg_tx_count: tx_sum as f64 / denom,
        avg_days_active: days_sum as f64 / denom,
        avg_unique_contracts: uniq_sum as f64 / denom,
        suspected_farm_count,
        suspected_farm_rate: suspected_farm_count as f64 / denom,
        avg_score: score_sum as f64 / denom,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insight::compute_insight;
    use crate::models::{
        CoreOutput, DataSource, UsageCriteria, UsageCriteriaParams, UsageProof, UsageSummary,
        UsageWindow, UsageWindowType,
    };

    fn row(wallet: &str, verified: bool, usage: UsageSummary) -> WalletResultRow {
        let insights = compute_insight(&usage);
        WalletResultRow {
            wallet: wallet.to_string(),
            display_name: None,
            input_source: None,
            output: Some(CoreOutput {
                protocol: "poe".to_string(),
                output_version: "v1".to_string(),
                wallet: wallet.to_string(),
                campaign_id: "camp-1".to_string(),
                window: UsageWindow::from_type(UsageWindowType::Last7Days, 1_700_000_000)
                    .unwrap(),
                verified_usage: verified,
                usage_summary: usage,
                criteria: UsageCriteria {
                    criteria_set_id: "default".to_string(),
                    engine_version: "v1".to_string(),
                    params: UsageCriteriaParams {
                        min_tx_count: 5,
                        min_days_active: 2,
                        min_unique_contracts: 1,
                    },
                },
                proof: UsageProof {
                    hash_algorithm: "keccak256".to_string(),
                    canonical_hash: format!("0x{wallet}"),
                },
            }),
            insights: Some(insights),
            commentary: None,
            cached_core: Some(false),
            cached_insights: Some(false),
            cached_commentary: None,
            source: DataSource::Insights,
            error: None,
        }
    }

    fn usage(tx_count: u64, days_active: u64, unique_contracts: u64) -> UsageSummary {
        UsageSummary {
            tx_count,
            days_active,
            unique_contracts,
        }
    }

    #[test]
    fn empty_rows_produce_the_default_summary() {
        assert_eq!(summarize_rows(&[]), RunSummary::default());
    }

    #[test]
    fn error_rows_are_excluded_from_every_stat() {
        let rows = vec![
            row("0xaa", true, usage(10, 5, 3)),
            row("0xbb", false, usage(30, 7, 1)),
            WalletResultRow::failed("0xcc", "Missing result."),
        ];
        let summary = summarize_rows(&rows);

        assert_eq!(summary.total, 2);
        assert_eq!(summary.verified_true, 1);
        assert_eq!(summary.verified_false, 1);
        assert_eq!(summary.verified_rate, 0.5);
        assert_eq!(summary.avg_tx_count, 20.0);
        assert_eq!(summary.avg_days_active, 6.0);
        assert_eq!(summary.avg_unique_contracts, 2.0);
    }

    #[test]
    fn suspected_farms_are_counted_from_insights() {
        let rows = vec![
            // burst pattern: suspected farm
            row("0xaa", false, usage(120, 1, 1)),
            row("0xbb", true, usage(100, 28, 15)),
        ];
        let summary = summarize_rows(&rows);
        assert_eq!(summary.suspected_farm_count, 1);
        assert_eq!(summary.suspected_farm_rate, 0.5);
        assert!(summary.avg_score > 0.0);
    }
}
