//! Layered evaluation caches
//!
//! One moka cache behind typed keys covers every layer: core outputs keyed
//! by the full evaluation identity, insights and commentary keyed by the
//! proof hash they were derived from, and ENS resolutions keyed by name.
//! Only successful ENS resolutions are cached so unresolved names retry on
//! demand.

use std::time::Duration;

use moka::future::Cache;
use proof_core::{CommentaryResult, CoreOutput, InsightResult, UsageWindow};

use crate::config::CacheConfig;
use crate::ens::EnsResolution;

/// Cache key types for the different layers
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
enum CacheKey {
    Core {
        wallet: String,
        campaign_id: String,
        window_start: i64,
        window_end: i64,
        criteria_set_id: Option<String>,
    },
    Insights {
        canonical_hash: String,
    },
    Commentary {
        canonical_hash: String,
    },
    Ens {
        name: String,
    },
}

/// Cached value wrapper
#[derive(Debug, Clone)]
enum CacheValue {
    Core(CoreOutput),
    Insights(InsightResult),
    Commentary(CommentaryResult),
    Ens(EnsResolution),
}

/// Shared cache over every evaluation layer.
#[derive(Clone)]
pub struct EvalCache {
    cache: Cache<CacheKey, CacheValue>,
}

impl EvalCache {
    pub fn new(config: &CacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(Duration::from_secs(config.ttl_seconds))
            .build();

        Self { cache }
    }

    fn core_key(
        wallet: &str,
        campaign_id: &str,
        window: &UsageWindow,
        criteria_set_id: Option<&str>,
    ) -> CacheKey {
        CacheKey::Core {
            wallet: wallet.to_string(),
            campaign_id: campaign_id.to_string(),
            window_start: window.start,
            window_end: window.end,
            criteria_set_id: criteria_set_id.map(str::to_string),
        }
    }

    pub async fn get_core(
        &self,
        wallet: &str,
        campaign_id: &str,
        window: &UsageWindow,
        criteria_set_id: Option<&str>,
    ) -> Option<CoreOutput> {
        let key = Self::core_key(wallet, campaign_id, window, criteria_set_id);
        self.cache.get(&key).await.and_then(|value| {
            if let CacheValue::Core(output) = value {
                Some(output)
            } else {
                None
            }
        })
    }

    pub async fn put_core(
        &self,
        campaign_id: &str,
        window: &UsageWindow,
        criteria_set_id: Option<&str>,
        output: CoreOutput,
    ) {
        let key = Self::core_key(&output.wallet, campaign_id, window, criteria_set_id);
        self.cache.insert(key, CacheValue::Core(output)).await;
    }

    pub async fn get_insights(&self, canonical_hash: &str) -> Option<InsightResult> {
        let key = CacheKey::Insights {
            canonical_hash: canonical_hash.to_string(),
        };
        self.cache.get(&key).await.and_then(|value| {
            if let CacheValue::Insights(insights) = value {
                Some(insights)
            } else {
                None
            }
        })
    }

    pub async fn put_insights(&self, canonical_hash: &str, insights: InsightResult) {
        let key = CacheKey::Insights {
            canonical_hash: canonical_hash.to_string(),
        };
        self.cache.insert(key, CacheValue::Insights(insights)).await;
    }

    pub async fn get_commentary(&self, canonical_hash: &str) -> Option<CommentaryResult> {
        let key = CacheKey::Commentary {
            canonical_hash: canonical_hash.to_string(),
        };
        self.cache.get(&key).await.and_then(|value| {
            if let CacheValue::Commentary(commentary) = value {
                Some(commentary)
            } else {
                None
            }
        })
    }

    pub async fn put_commentary(&self, canonical_hash: &str, commentary: CommentaryResult) {
        let key = CacheKey::Commentary {
            canonical_hash: canonical_hash.to_string(),
        };
        self.cache
            .insert(key, CacheValue::Commentary(commentary))
            .await;
    }

    pub async fn get_ens(&self, name: &str) -> Option<EnsResolution> {
        let key = CacheKey::Ens {
            name: name.to_string(),
        };
        self.cache.get(&key).await.and_then(|value| {
            if let CacheValue::Ens(resolution) = value {
                Some(resolution)
            } else {
                None
            }
        })
    }

    pub async fn put_ens(&self, resolution: EnsResolution) {
        let key = CacheKey::Ens {
            name: resolution.name.clone(),
        };
        self.cache.insert(key, CacheValue::Ens(resolution)).await;
    }
}
