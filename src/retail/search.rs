//! Multi-retailer search orchestration.
//!
//! Sequential fetches with fixed caps. A failing retailer is logged and
//! skipped for that query; nothing is retried.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, warn};

use super::{Budget, Product, Retailer};
use crate::config::SearchConfig;

pub struct SearchOrchestrator {
    retailers: Vec<Arc<dyn Retailer>>,
    config: SearchConfig,
}

impl SearchOrchestrator {
    pub fn new(retailers: Vec<Arc<dyn Retailer>>, config: SearchConfig) -> Self {
        Self { retailers, config }
    }

    /// Run each query against each retailer, collecting a deduplicated,
    /// in-budget candidate pool.
    pub async fn search(&self, queries: &[String], budget: Budget) -> Vec<Product> {
        let mut candidates: Vec<Product> = Vec::new();
        let mut seen: HashSet<(String, String)> = HashSet::new();
        let mut failures = 0usize;

        'queries: for query in queries
            .iter()
            .map(|q| q.trim())
            .filter(|q| !q.is_empty())
            .take(self.config.max_queries)
        {
            for retailer in &self.retailers {
                if candidates.len() >= self.config.max_candidates {
                    break 'queries;
                }

                let products = match retailer
                    .search(query, budget, self.config.per_retailer_limit)
                    .await
                {
                    Ok(products) => products,
                    Err(e) => {
                        failures += 1;
                        warn!(retailer = retailer.name(), query, error = %e, "Retailer search failed");
                        continue;
                    }
                };

                for product in products.into_iter().take(self.config.per_retailer_limit) {
                    if candidates.len() >= self.config.max_candidates {
                        break;
                    }
                    if !budget.contains(product.price) {
                        continue;
                    }
                    if seen.insert((product.retailer.clone(), product.external_id.clone())) {
                        candidates.push(product);
                    }
                }
            }
        }

        info!(
            queries = queries.len().min(self.config.max_queries),
            candidates = candidates.len(),
            failures,
            "Retailer search finished"
        );
        candidates
    }
}
