//! Incremental score sync.
//!
//! The listing page is cheap; the per-course analytics page is not. Rows
//! already in the cache are skipped unless a full refresh is requested.

pub mod scores;

pub use scores::{sync_scores, ScoreDetailSource};
