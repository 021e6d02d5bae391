//! Shared JSON fixtures for HTTP-backed tests

use serde_json::{json, Value};

pub(crate) fn core_output_json(wallet: &str) -> Value {
    core_output_json_with_hash(wallet, &format!("0xhash-{wallet}"))
}

pub(crate) fn core_output_json_with_hash(wallet: &str, canonical_hash: &str) -> Value {
    json!({
        "protocol": "poe",
        "output_version": "v1",
        "wallet": wallet,
        "campaign_id": "camp-1",
        "window": { "type": "last_7_days", "start": 1_699_395_200, "end": 1_700_000_000 },
        "verified_usage": true,
        "usage_summary": { "tx_count": 50, "days_active": 10, "unique_contracts": 5 },
        "criteria": {
            "criteria_set_id": "default",
            "engine_version": "v1",
            "params": { "min_tx_count": 5, "min_days_active": 2, "min_unique_contracts": 1 }
        },
        "proof": { "hash_algorithm": "keccak256", "canonical_hash": canonical_hash }
    })
}

pub(crate) fn insights_json(overall_score: u8) -> Value {
    json!({
        "overall_score": overall_score,
        "farming_probability": 0.12,
        "behavior_tag": "organic",
        "insight_version": "v1"
    })
}

pub(crate) fn commentary_json(text: &str) -> Value {
    json!({
        "commentary_version": "v1",
        "model": "demo-commentator",
        "text": text,
        "created_at": 1_700_000_100
    })
}
