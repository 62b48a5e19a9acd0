//! Catalog aggregation pipeline: fetch skill metadata from provider
//! repositories, normalize into skill records, detect near-duplicates via
//! compression-based similarity, score quality, and assemble the unified
//! catalog document.

pub mod aggregate;
pub mod build;
pub mod dedup;
pub mod enrich;
pub mod fetch;
pub mod parse;
pub mod providers;
pub mod similarity;
pub mod state;
pub mod taxonomy;
pub mod types;
