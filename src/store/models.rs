//! Persisted row types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::curation::CuratedGift;
use crate::profile::{GiftProfile, Recipient};
use crate::scrape::{Platform, ScrapedProfile};

/// A user of the service (the gift giver).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub display_name: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrapeStatus {
    Pending,
    Scraping,
    Completed,
    Failed,
}

impl ScrapeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrapeStatus::Pending => "pending",
            ScrapeStatus::Scraping => "scraping",
            ScrapeStatus::Completed => "completed",
            ScrapeStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "scraping" => ScrapeStatus::Scraping,
            "completed" => ScrapeStatus::Completed,
            "failed" => ScrapeStatus::Failed,
            _ => ScrapeStatus::Pending,
        }
    }
}

/// A social account attached to a profile, with the outcome of its last scrape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialProfile {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub platform: Platform,
    pub handle: String,
    pub scrape_status: ScrapeStatus,
    pub scraped_data: Option<ScrapedProfile>,
    pub error: Option<String>,
    pub scraped_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SocialProfile {
    /// A completed scrape newer than `max_age`.
    pub fn is_fresh(&self, max_age: chrono::Duration) -> bool {
        self.scrape_status == ScrapeStatus::Completed
            && self.scraped_data.is_some()
            && self
                .scraped_at
                .is_some_and(|at| Utc::now() - at < max_age)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    Scraping,
    Analyzing,
    Searching,
    Curating,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Scraping => "scraping",
            SessionStatus::Analyzing => "analyzing",
            SessionStatus::Searching => "searching",
            SessionStatus::Curating => "curating",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "scraping" => SessionStatus::Scraping,
            "analyzing" => SessionStatus::Analyzing,
            "searching" => SessionStatus::Searching,
            "curating" => SessionStatus::Curating,
            "completed" => SessionStatus::Completed,
            "failed" => SessionStatus::Failed,
            _ => SessionStatus::Pending,
        }
    }
}

/// A social account to scrape for a session's recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandleRef {
    pub platform: Platform,
    pub handle: String,
}

/// Input for creating a recommendation session.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub profile_id: Uuid,
    pub recipient_name: String,
    pub relationship: Option<String>,
    pub occasion: Option<String>,
    pub budget_min: Option<Decimal>,
    pub budget_max: Option<Decimal>,
    pub description: Option<String>,
    pub handles: Vec<HandleRef>,
}

/// One gift search for one recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationSession {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub recipient_name: String,
    pub relationship: Option<String>,
    pub occasion: Option<String>,
    pub budget_min: Option<Decimal>,
    pub budget_max: Option<Decimal>,
    pub description: Option<String>,
    pub handles: Vec<HandleRef>,
    pub status: SessionStatus,
    pub gift_profile: Option<GiftProfile>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecommendationSession {
    pub fn recipient(&self) -> Recipient {
        Recipient {
            name: self.recipient_name.clone(),
            relationship: self.relationship.clone(),
            occasion: self.occasion.clone(),
            budget_min: self.budget_min,
            budget_max: self.budget_max,
            description: self.description.clone(),
        }
    }
}

/// A shortlisted product saved against a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GiftProduct {
    pub id: Uuid,
    pub session_id: Uuid,
    pub retailer: String,
    pub external_id: String,
    pub title: String,
    pub price: Decimal,
    pub currency: String,
    pub url: String,
    pub image_url: Option<String>,
    pub rating: Option<f32>,
    pub reason: String,
    pub rank: u32,
    pub created_at: DateTime<Utc>,
}

impl GiftProduct {
    pub fn from_curated(session_id: Uuid, gift: &CuratedGift) -> Self {
        let p = &gift.product;
        Self {
            id: Uuid::new_v4(),
            session_id,
            retailer: p.retailer.clone(),
            external_id: p.external_id.clone(),
            title: p.title.clone(),
            price: p.price,
            currency: p.currency.clone(),
            url: p.url.clone(),
            image_url: p.image_url.clone(),
            rating: p.rating,
            reason: gift.reason.clone(),
            rank: gift.rank,
            created_at: Utc::now(),
        }
    }
}
