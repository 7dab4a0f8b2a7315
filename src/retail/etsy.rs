//! Etsy Open API v3.

use async_trait::async_trait;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

use super::{Budget, Product, Retailer, fetch_json, http_client};
use crate::error::RetailerError;

pub const DEFAULT_BASE_URL: &str = "https://openapi.etsy.com";
const NAME: &str = "etsy";
/// Etsy caps `limit` at 100.
const MAX_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
struct ListingsResponse {
    #[serde(default)]
    results: Vec<Listing>,
}

#[derive(Debug, Deserialize)]
struct Listing {
    listing_id: u64,
    title: String,
    url: Option<String>,
    price: Money,
    #[serde(default)]
    images: Vec<ListingImage>,
}

#[derive(Debug, Deserialize)]
struct Money {
    amount: i64,
    divisor: i64,
    currency_code: String,
}

#[derive(Debug, Deserialize)]
struct ListingImage {
    #[serde(rename = "url_570xN")]
    url_570x_n: Option<String>,
}

pub struct EtsyRetailer {
    http: reqwest::Client,
    api_key: SecretString,
    base_url: String,
}

impl EtsyRetailer {
    pub fn new(api_key: SecretString, base_url: &str) -> Self {
        Self {
            http: http_client(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

fn to_product(listing: Listing) -> Option<Product> {
    if listing.price.divisor <= 0 {
        return None;
    }
    let price = Decimal::from(listing.price.amount) / Decimal::from(listing.price.divisor);
    Some(Product {
        retailer: NAME.to_string(),
        external_id: listing.listing_id.to_string(),
        title: listing.title,
        price: price.round_dp(2),
        currency: listing.price.currency_code,
        url: listing
            .url
            .unwrap_or_else(|| format!("https://www.etsy.com/listing/{}", listing.listing_id)),
        image_url: listing.images.into_iter().find_map(|i| i.url_570x_n),
        rating: None,
    })
}

#[async_trait]
impl Retailer for EtsyRetailer {
    fn name(&self) -> &str {
        NAME
    }

    async fn search(
        &self,
        query: &str,
        budget: Budget,
        limit: usize,
    ) -> Result<Vec<Product>, RetailerError> {
        let mut params: Vec<(&str, String)> = vec![
            ("keywords", query.to_string()),
            ("limit", limit.min(MAX_LIMIT).to_string()),
            ("includes", "Images".to_string()),
        ];
        if let Some(min) = budget.min {
            params.push(("min_price", min.to_string()));
        }
        if let Some(max) = budget.max {
            params.push(("max_price", max.to_string()));
        }

        let request = self
            .http
            .get(format!("{}/v3/application/listings/active", self.base_url))
            .header("x-api-key", self.api_key.expose_secret())
            .query(&params);
        let response: ListingsResponse = fetch_json(NAME, request).await?;

        let products: Vec<Product> = response.results.into_iter().filter_map(to_product).collect();
        debug!(query, count = products.len(), "Etsy search finished");
        Ok(products)
    }
}
