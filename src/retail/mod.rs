//! E-commerce affiliate APIs.

pub mod amazon;
pub mod ebay;
pub mod etsy;
pub mod search;

pub use amazon::AmazonRetailer;
pub use ebay::EbayRetailer;
pub use etsy::EtsyRetailer;
pub use search::SearchOrchestrator;

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::RetailerConfig;
use crate::error::RetailerError;

/// A purchasable candidate returned by a retailer search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub retailer: String,
    pub external_id: String,
    pub title: String,
    pub price: Decimal,
    pub currency: String,
    /// Affiliate-tagged where the retailer supports it.
    pub url: String,
    pub image_url: Option<String>,
    pub rating: Option<f32>,
}

/// Inclusive price bounds; either side may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Budget {
    pub min: Option<Decimal>,
    pub max: Option<Decimal>,
}

impl Budget {
    pub fn new(min: Option<Decimal>, max: Option<Decimal>) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, price: Decimal) -> bool {
        self.min.is_none_or(|min| price >= min) && self.max.is_none_or(|max| price <= max)
    }
}

/// An affiliate product search API.
#[async_trait]
pub trait Retailer: Send + Sync {
    fn name(&self) -> &str;

    async fn search(
        &self,
        query: &str,
        budget: Budget,
        limit: usize,
    ) -> Result<Vec<Product>, RetailerError>;
}

/// Build every retailer that has credentials configured.
pub fn create_retailers(config: &RetailerConfig) -> Vec<Arc<dyn Retailer>> {
    let mut retailers: Vec<Arc<dyn Retailer>> = Vec::new();
    if let Some(key) = &config.etsy_api_key {
        retailers.push(Arc::new(EtsyRetailer::new(key.clone(), etsy::DEFAULT_BASE_URL)));
    }
    if let Some(token) = &config.ebay_access_token {
        retailers.push(Arc::new(EbayRetailer::new(
            token.clone(),
            config.ebay_campaign_id.clone(),
            ebay::DEFAULT_BASE_URL,
        )));
    }
    if let Some(key) = &config.rainforest_api_key {
        retailers.push(Arc::new(AmazonRetailer::new(
            key.clone(),
            config.amazon_associate_tag.clone(),
            amazon::DEFAULT_BASE_URL,
        )));
    }
    tracing::info!(
        retailers = ?retailers.iter().map(|r| r.name().to_string()).collect::<Vec<_>>(),
        "Affiliate retailers configured"
    );
    retailers
}

/// Send a GET and decode JSON, mapping failures to `RetailerError`.
pub(crate) async fn fetch_json<T: serde::de::DeserializeOwned>(
    retailer: &str,
    request: reqwest::RequestBuilder,
) -> Result<T, RetailerError> {
    let response = request
        .send()
        .await
        .map_err(|e| RetailerError::RequestFailed {
            retailer: retailer.to_string(),
            reason: e.to_string(),
        })?;
    let status = response.status();
    if !status.is_success() {
        return Err(RetailerError::Status {
            retailer: retailer.to_string(),
            status: status.as_u16(),
        });
    }
    response
        .json()
        .await
        .map_err(|e| RetailerError::InvalidResponse {
            retailer: retailer.to_string(),
            reason: e.to_string(),
        })
}

pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(20))
        .build()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn budget_bounds_are_inclusive() {
        let budget = Budget::new(Some(dec!(20)), Some(dec!(50)));
        assert!(budget.contains(dec!(20)));
        assert!(budget.contains(dec!(50)));
        assert!(!budget.contains(dec!(19.99)));
        assert!(!budget.contains(dec!(50.01)));
    }

    #[test]
    fn open_budget_accepts_anything() {
        assert!(Budget::default().contains(dec!(0)));
        assert!(Budget::new(None, Some(dec!(10))).contains(dec!(1)));
        assert!(Budget::new(Some(dec!(10)), None).contains(dec!(1000)));
    }

    #[test]
    fn no_credentials_no_retailers() {
        assert!(create_retailers(&RetailerConfig::default()).is_empty());
    }
}
