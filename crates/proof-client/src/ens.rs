//! ENS resolution gateway
//!
//! Resolves a batch of ENS names to addresses with bounded concurrency and
//! folds the outcome into the final evaluation wallet list. Unresolved names
//! never abort a run; they are surfaced with a reason code (`rpc_missing`,
//! `resolver_error`, `not_found`) instead. Only successful resolutions are
//! cached, so unresolved names retry on demand.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use proof_core::{is_valid_address, InputKind, InputSource, WalletInputEntry};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::api::ProofApi;
use crate::batch::{run_batch, with_cancel};
use crate::cache::EvalCache;
use crate::error::Result;

/// Outcome of resolving one ENS name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsResolution {
    pub name: String,
    /// Lowercased resolved address, when resolution succeeded
    pub address: Option<String>,
    /// Reason code when it did not
    pub error: Option<String>,
    pub cached: bool,
}

/// Result of a batch resolution.
#[derive(Debug, Clone, Serialize)]
pub struct EnsBatchOutcome {
    pub resolutions: Vec<EnsResolution>,
    /// Names without an address, in input order
    pub unresolved: Vec<String>,
}

/// Bounded-concurrency resolver over the ENS endpoint.
pub struct EnsGateway {
    api: Arc<ProofApi>,
    cache: EvalCache,
    concurrency: usize,
}

impl EnsGateway {
    pub fn new(api: Arc<ProofApi>, cache: EvalCache, concurrency: usize) -> Self {
        Self {
            api,
            cache,
            concurrency,
        }
    }

    /// Resolve every name, never failing per name; transport failures become
    /// `resolver_error` entries. Cancellation aborts the batch.
    pub async fn resolve_batch(
        &self,
        names: &[String],
        cancel: &CancellationToken,
    ) -> Result<EnsBatchOutcome> {
        let resolutions = run_batch(
            names.to_vec(),
            self.concurrency,
            cancel,
            |name, _index| self.resolve_one(name, cancel),
            |name, _err| EnsResolution {
                name: name.clone(),
                address: None,
                error: Some("resolver_error".to_string()),
                cached: false,
            },
            None,
        )
        .await?;

        let unresolved = resolutions
            .iter()
            .filter(|resolution| resolution.address.is_none())
            .map(|resolution| resolution.name.clone())
            .collect();

        Ok(EnsBatchOutcome {
            resolutions,
            unresolved,
        })
    }

    async fn resolve_one(
        &self,
        name: String,
        cancel: &CancellationToken,
    ) -> Result<EnsResolution> {
        if let Some(hit) = self.cache.get_ens(&name).await {
            tracing::trace!(name = %name, "ENS resolution served from cache");
            return Ok(EnsResolution { cached: true, ..hit });
        }

        let payload = with_cancel(cancel, self.api.ens_resolve(&name)).await?;
        let address = payload
            .normalized_address
            .or_else(|| payload.address.map(|addr| addr.to_lowercase()));
        let error = if address.is_some() {
            None
        } else {
            Some(payload.error.unwrap_or_else(|| "not_found".to_string()))
        };

        let resolution = EnsResolution {
            name,
            address,
            error,
            cached: payload.cached,
        };
        if resolution.address.is_some() {
            self.cache.put_ens(resolution.clone()).await;
        }
        Ok(resolution)
    }
}

// =============================================================================
// Wallet Plan
// =============================================================================

/// Display metadata carried onto a wallet's result row.
#[derive(Debug, Clone, Serialize)]
pub struct WalletMeta {
    pub display_name: Option<String>,
    pub input_source: InputSource,
    pub ens_cached: bool,
}

/// An input excluded from evaluation, with the reason why.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UnresolvedInput {
    pub value: String,
    pub reason: String,
}

/// The final evaluation wallet list with per-address metadata.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WalletPlan {
    /// Deduplicated lowercase addresses in first-seen order
    pub wallets: Vec<String>,
    pub invalid: Vec<UnresolvedInput>,
    pub meta: HashMap<String, WalletMeta>,
}

/// Merge direct addresses and resolved ENS names into the evaluation list.
///
/// The same address reached both ways keeps its first position, gains the
/// ENS display name, and reports `input_source: ens`.
pub fn build_wallet_plan(
    inputs: &[WalletInputEntry],
    resolutions: &[EnsResolution],
) -> WalletPlan {
    let by_name: HashMap<&str, &EnsResolution> = resolutions
        .iter()
        .map(|resolution| (resolution.name.as_str(), resolution))
        .collect();

    let mut builder = PlanBuilder::default();

    for entry in inputs {
        match entry.kind {
            InputKind::Address => {
                if let Some(address) = &entry.normalized {
                    builder.add_address(
                        address,
                        WalletMeta {
                            display_name: None,
                            input_source: InputSource::Address,
                            ens_cached: false,
                        },
                    );
                }
            }
            InputKind::Ens => {
                let Some(name) = &entry.normalized else {
                    continue;
                };
                match by_name.get(name.as_str()) {
                    Some(resolution) => match &resolution.address {
                        Some(address) => builder.add_address(
                            address,
                            WalletMeta {
                                display_name: Some(name.clone()),
                                input_source: InputSource::Ens,
                                ens_cached: resolution.cached,
                            },
                        ),
                        None => {
                            let reason = resolution.error.as_deref().unwrap_or("not_found");
                            builder.mark_invalid(name, reason);
                        }
                    },
                    None => builder.mark_invalid(name, "not_found"),
                }
            }
            InputKind::Invalid => {}
        }
    }

    builder.plan
}

#[derive(Default)]
struct PlanBuilder {
    plan: WalletPlan,
    seen_wallets: HashSet<String>,
    seen_invalid: HashSet<(String, String)>,
}

impl PlanBuilder {
    fn mark_invalid(&mut self, value: &str, reason: &str) {
        if self
            .seen_invalid
            .insert((value.to_string(), reason.to_string()))
        {
            self.plan.invalid.push(UnresolvedInput {
                value: value.to_string(),
                reason: reason.to_string(),
            });
        }
    }

    fn add_address(&mut self, address: &str, meta: WalletMeta) {
        let normalized = address.trim().to_lowercase();
        if !is_valid_address(&normalized) {
            let shown = meta
                .display_name
                .clone()
                .unwrap_or_else(|| normalized.clone());
            self.mark_invalid(&shown, "invalid_address");
            return;
        }
        match self.plan.meta.get_mut(&normalized) {
            Some(existing) => {
                if existing.display_name.is_none() {
                    existing.display_name = meta.display_name;
                }
                if meta.input_source == InputSource::Ens {
                    existing.input_source = InputSource::Ens;
                }
                existing.ens_cached |= meta.ens_cached;
            }
            None => {
                self.plan.meta.insert(normalized.clone(), meta);
            }
        }
        if self.seen_wallets.insert(normalized.clone()) {
            self.plan.wallets.push(normalized);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::GET, MockServer};
    use proof_core::normalize_wallet_input;

    use crate::config::{ApiConfig, CacheConfig};

    const ADDR: &str = "0x52908400098527886e0f7030069857d2e4169ee7";

    fn resolution(name: &str, address: Option<&str>, error: Option<&str>) -> EnsResolution {
        EnsResolution {
            name: name.to_string(),
            address: address.map(str::to_string),
            error: error.map(str::to_string),
            cached: false,
        }
    }

    #[test]
    fn plan_merges_address_and_ens_entries() {
        let input = format!("{ADDR} alice.eth bob.eth");
        let normalized = normalize_wallet_input(&input);
        let resolutions = vec![
            resolution("alice.eth", Some(ADDR), None),
            resolution("bob.eth", Some("0x1111111111111111111111111111111111111111"), None),
        ];

        let plan = build_wallet_plan(&normalized.inputs, &resolutions);

        assert_eq!(
            plan.wallets,
            vec![
                ADDR.to_string(),
                "0x1111111111111111111111111111111111111111".to_string()
            ]
        );
        // The duplicate address keeps first position but gains ENS metadata.
        let meta = plan.meta.get(ADDR).unwrap();
        assert_eq!(meta.display_name.as_deref(), Some("alice.eth"));
        assert_eq!(meta.input_source, InputSource::Ens);
        assert!(plan.invalid.is_empty());
    }

    #[test]
    fn unresolved_names_are_excluded_with_reasons() {
        let normalized = normalize_wallet_input("alice.eth ghost.eth broken.eth");
        let resolutions = vec![
            resolution("alice.eth", Some(ADDR), None),
            resolution("ghost.eth", None, Some("not_found")),
            resolution("broken.eth", None, Some("rpc_missing")),
        ];

        let plan = build_wallet_plan(&normalized.inputs, &resolutions);

        assert_eq!(plan.wallets, vec![ADDR.to_string()]);
        assert_eq!(
            plan.invalid,
            vec![
                UnresolvedInput {
                    value: "ghost.eth".to_string(),
                    reason: "not_found".to_string()
                },
                UnresolvedInput {
                    value: "broken.eth".to_string(),
                    reason: "rpc_missing".to_string()
                },
            ]
        );
    }

    #[test]
    fn malformed_resolved_addresses_are_flagged() {
        let normalized = normalize_wallet_input("alice.eth");
        let resolutions = vec![resolution("alice.eth", Some("0xnothex"), None)];

        let plan = build_wallet_plan(&normalized.inputs, &resolutions);

        assert!(plan.wallets.is_empty());
        assert_eq!(plan.invalid[0].reason, "invalid_address");
        assert_eq!(plan.invalid[0].value, "alice.eth");
    }

    fn gateway_for(server: &MockServer) -> EnsGateway {
        let api = Arc::new(ProofApi::new(&ApiConfig {
            base_url: server.base_url(),
            timeout_seconds: 5,
        }));
        let cache = EvalCache::new(&CacheConfig::default());
        EnsGateway::new(api, cache, 4)
    }

    #[tokio::test]
    async fn batch_resolution_classifies_failures() {
        let server = MockServer::start_async().await;
        let ok = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v1/ens/resolve")
                    .query_param("name", "alice.eth");
                then.status(200).json_body(serde_json::json!({
                    "name": "alice.eth",
                    "address": ADDR.to_uppercase().replace("0X", "0x"),
                    "normalized_address": null,
                    "cached": false,
                    "error": null
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v1/ens/resolve")
                    .query_param("name", "ghost.eth");
                then.status(200).json_body(serde_json::json!({
                    "name": "ghost.eth",
                    "address": null,
                    "normalized_address": null,
                    "cached": false,
                    "error": "rpc_missing"
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v1/ens/resolve")
                    .query_param("name", "down.eth");
                then.status(500).body("resolver exploded");
            })
            .await;

        let gateway = gateway_for(&server);
        let names = vec![
            "alice.eth".to_string(),
            "ghost.eth".to_string(),
            "down.eth".to_string(),
        ];
        let cancel = CancellationToken::new();
        let outcome = gateway.resolve_batch(&names, &cancel).await.unwrap();

        // Addresses are lowercased on the way in.
        assert_eq!(outcome.resolutions[0].address.as_deref(), Some(ADDR));
        assert_eq!(outcome.resolutions[1].error.as_deref(), Some("rpc_missing"));
        assert_eq!(
            outcome.resolutions[2].error.as_deref(),
            Some("resolver_error")
        );
        assert_eq!(
            outcome.unresolved,
            vec!["ghost.eth".to_string(), "down.eth".to_string()]
        );

        // A second batch serves the resolved name from cache.
        let again = gateway
            .resolve_batch(&["alice.eth".to_string()], &cancel)
            .await
            .unwrap();
        assert!(again.resolutions[0].cached);
        assert_eq!(ok.hits_async().await, 1);
    }
}
