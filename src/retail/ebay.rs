//! eBay Browse API (item_summary/search) with Partner Network affiliate context.

use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{Budget, Product, Retailer, fetch_json, http_client};
use crate::error::RetailerError;

pub const DEFAULT_BASE_URL: &str = "https://api.ebay.com";
const NAME: &str = "ebay";
const MARKETPLACE: &str = "EBAY_US";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    item_summaries: Vec<ItemSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemSummary {
    item_id: String,
    title: String,
    price: Option<Price>,
    item_web_url: Option<String>,
    item_affiliate_web_url: Option<String>,
    image: Option<Image>,
}

#[derive(Debug, Deserialize)]
struct Price {
    value: String,
    currency: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Image {
    image_url: Option<String>,
}

pub struct EbayRetailer {
    http: reqwest::Client,
    access_token: SecretString,
    campaign_id: Option<String>,
    base_url: String,
}

impl EbayRetailer {
    pub fn new(access_token: SecretString, campaign_id: Option<String>, base_url: &str) -> Self {
        Self {
            http: http_client(),
            access_token,
            campaign_id,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

/// Browse API price filter, e.g. `price:[10..50],priceCurrency:USD`.
fn price_filter(budget: Budget) -> Option<String> {
    if budget.min.is_none() && budget.max.is_none() {
        return None;
    }
    let min = budget.min.map(|d| d.to_string()).unwrap_or_default();
    let max = budget.max.map(|d| d.to_string()).unwrap_or_default();
    Some(format!("price:[{min}..{max}],priceCurrency:USD"))
}

fn to_product(item: ItemSummary) -> Option<Product> {
    let price = item.price?;
    let value = match Decimal::from_str(&price.value) {
        Ok(v) => v,
        Err(e) => {
            warn!(item_id = %item.item_id, value = %price.value, error = %e, "Unparseable eBay price");
            return None;
        }
    };
    let url = item.item_affiliate_web_url.or(item.item_web_url)?;
    Some(Product {
        retailer: NAME.to_string(),
        external_id: item.item_id,
        title: item.title,
        price: value,
        currency: price.currency,
        url,
        image_url: item.image.and_then(|i| i.image_url),
        rating: None,
    })
}

#[async_trait]
impl Retailer for EbayRetailer {
    fn name(&self) -> &str {
        NAME
    }

    async fn search(
        &self,
        query: &str,
        budget: Budget,
        limit: usize,
    ) -> Result<Vec<Product>, RetailerError> {
        let mut params: Vec<(&str, String)> =
            vec![("q", query.to_string()), ("limit", limit.to_string())];
        if let Some(filter) = price_filter(budget) {
            params.push(("filter", filter));
        }

        let mut request = self
            .http
            .get(format!("{}/buy/browse/v1/item_summary/search", self.base_url))
            .bearer_auth(self.access_token.expose_secret())
            .header("X-EBAY-C-MARKETPLACE-ID", MARKETPLACE)
            .query(&params);
        if let Some(campaign) = &self.campaign_id {
            request = request.header(
                "X-EBAY-C-ENDUSERCTX",
                format!("affiliateCampaignId={campaign}"),
            );
        }

        let response: SearchResponse = fetch_json(NAME, request).await?;
        let products: Vec<Product> = response
            .item_summaries
            .into_iter()
            .filter_map(to_product)
            .collect();
        debug!(query, count = products.len(), "eBay search finished");
        Ok(products)
    }
}
