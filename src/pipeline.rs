//! Enrichment pipeline stages and the orchestrator that sequences them.
pub mod batch;
pub mod classify;
pub mod dataset;
pub mod date_range;
pub mod dedup;
pub mod export;
pub mod funnel;
pub mod keywords;
pub mod language;
pub mod orchestrator;
pub mod post_url;
pub mod taxonomy;
