//! Amazon product search through the Rainforest API, tagged with an Associates id.

use async_trait::async_trait;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

use super::{Budget, Product, Retailer, fetch_json, http_client};
use crate::error::RetailerError;

pub const DEFAULT_BASE_URL: &str = "https://api.rainforestapi.com";
const NAME: &str = "amazon";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    search_results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    asin: String,
    title: String,
    link: Option<String>,
    image: Option<String>,
    rating: Option<f32>,
    price: Option<Price>,
}

#[derive(Debug, Deserialize)]
struct Price {
    value: f64,
    currency: Option<String>,
}

pub struct AmazonRetailer {
    http: reqwest::Client,
    api_key: SecretString,
    associate_tag: Option<String>,
    base_url: String,
}

impl AmazonRetailer {
    pub fn new(api_key: SecretString, associate_tag: Option<String>, base_url: &str) -> Self {
        Self {
            http: http_client(),
            api_key,
            associate_tag,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

/// Canonical product URL with the associate tag attached.
fn affiliate_url(asin: &str, tag: Option<&str>) -> String {
    match tag {
        Some(tag) => format!("https://www.amazon.com/dp/{asin}?tag={tag}"),
        None => format!("https://www.amazon.com/dp/{asin}"),
    }
}

fn to_product(result: SearchResult, tag: Option<&str>) -> Option<Product> {
    let price = result.price?;
    let value = Decimal::from_f64_retain(price.value)?.round_dp(2);
    let url = if tag.is_some() || result.link.is_none() {
        affiliate_url(&result.asin, tag)
    } else {
        result.link.unwrap_or_default()
    };
    Some(Product {
        retailer: NAME.to_string(),
        external_id: result.asin,
        title: result.title,
        price: value,
        currency: price.currency.unwrap_or_else(|| "USD".to_string()),
        url,
        image_url: result.image,
        rating: result.rating,
    })
}

#[async_trait]
impl Retailer for AmazonRetailer {
    fn name(&self) -> &str {
        NAME
    }

    async fn search(
        &self,
        query: &str,
        budget: Budget,
        limit: usize,
    ) -> Result<Vec<Product>, RetailerError> {
        let request = self
            .http
            .get(format!("{}/request", self.base_url))
            .query(&[
                ("api_key", self.api_key.expose_secret()),
                ("type", "search"),
                ("amazon_domain", "amazon.com"),
                ("search_term", query),
            ]);
        let response: SearchResponse = fetch_json(NAME, request).await?;

        // Rainforest has no price filter on search, so apply the budget here.
        let products: Vec<Product> = response
            .search_results
            .into_iter()
            .filter_map(|r| to_product(r, self.associate_tag.as_deref()))
            .filter(|p| budget.contains(p.price))
            .take(limit)
            .collect();
        debug!(query, count = products.len(), "Amazon search finished");
        Ok(products)
    }
}
