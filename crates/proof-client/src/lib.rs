//! # Proof Client
//!
//! The evaluation client for proof-of-usage campaigns: given a wallet list,
//! a campaign and a usage window, it obtains one result row per wallet from
//! a tiered service API with progressive fallback.
//!
//! # Architecture
//!
//! - [`orchestrator`] walks the batch tiers (commentary, insights, core) and
//!   falls back to the per-wallet [`pipeline`] driven by the bounded
//!   concurrency runner in [`batch`].
//! - [`ens`] resolves ENS names to addresses ahead of evaluation.
//! - [`cache`] keeps moka caches for every layer; [`api`] owns the HTTP
//!   surface.

pub mod api;
pub mod batch;
pub mod cache;
pub mod config;
pub mod ens;
pub mod error;
pub mod orchestrator;
pub mod pipeline;

#[cfg(test)]
mod testutil;

pub use batch::{run_batch, ProgressFn};
pub use config::AppConfig;
pub use ens::{build_wallet_plan, EnsGateway};
pub use error::{ClientError, Result};
pub use orchestrator::{EvaluationOutcome, EvaluationRequest, Orchestrator, RunHandle};
