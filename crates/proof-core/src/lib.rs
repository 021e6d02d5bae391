//! # Proof Core
//!
//! Domain types and pure logic for proof-of-usage evaluation.
//!
//! This crate carries the canonical data structures shared by every consumer
//! of the evaluation pipeline, plus the side-effect-free pieces of the
//! pipeline itself: free-text wallet input normalization, the fallback
//! insight scorer, and the run-summary reducer.

pub mod error;
pub mod insight;
pub mod models;
pub mod normalize;
pub mod summary;

pub use error::*;
pub use insight::*;
pub use models::*;
pub use normalize::*;
pub use summary::*;
