//! Recommendation pipeline.
//!
//! One session flows through:
//! 1. `scraping`: each recipient handle is scraped (small bounded concurrency)
//! 2. `analyzing`: keyword enrichment, then gift-profile inference
//! 3. `searching`: affiliate retailer search
//! 4. `curating`: LLM shortlist, persisted with rank
//!
//! Progress lives on the `recommendation_sessions` row. Any error marks the
//! session `failed` with its message.

pub mod recommendation;

pub use recommendation::RecommendationPipeline;
