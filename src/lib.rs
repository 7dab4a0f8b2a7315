//! giftwise: gift recommendations from public social profiles.

pub mod config;
pub mod curation;
pub mod enrichment;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod profile;
pub mod retail;
pub mod scrape;
pub mod server;
pub mod store;
