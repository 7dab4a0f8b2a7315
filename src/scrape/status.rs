//! Scrape-status recording on `social_profiles` rows.

use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use super::{Platform, Scraper};
use crate::error::DatabaseError;
use crate::store::{Database, ScrapeStatus, SocialProfile};

const NO_DATA: &str = "scrape returned no data";

/// Scrape one handle and record the outcome on its row.
///
/// A fresh completed row (younger than `cache_window`) is returned as is.
/// Vendor failures are written to the row as `failed`; only database errors
/// propagate.
pub async fn scrape_social_profile(
    db: &dyn Database,
    scraper: &dyn Scraper,
    profile_id: Uuid,
    platform: Platform,
    handle: &str,
    cache_window: Duration,
) -> Result<SocialProfile, DatabaseError> {
    let row = db.upsert_social_profile(profile_id, platform, handle).await?;

    let max_age = chrono::Duration::from_std(cache_window).unwrap_or(chrono::Duration::zero());
    if row.is_fresh(max_age) {
        info!(%platform, handle, "Reusing cached scrape");
        return Ok(row);
    }

    db.update_scrape_status(row.id, ScrapeStatus::Scraping, None, None)
        .await?;

    match scraper.scrape(platform, handle).await {
        Ok(Some(data)) if !data.is_empty() => {
            info!(%platform, handle, posts = data.posts.len(), "Scrape completed");
            db.update_scrape_status(row.id, ScrapeStatus::Completed, Some(&data), None)
                .await?;
        }
        Ok(_) => {
            warn!(%platform, handle, "Scrape finished without data");
            db.update_scrape_status(row.id, ScrapeStatus::Failed, None, Some(NO_DATA))
                .await?;
        }
        Err(e) => {
            warn!(%platform, handle, error = %e, "Scrape failed");
            db.update_scrape_status(row.id, ScrapeStatus::Failed, None, Some(&e.to_string()))
                .await?;
        }
    }

    db.get_social_profile(row.id)
        .await?
        .ok_or_else(|| DatabaseError::NotFound {
            entity: "social_profile".to_string(),
            id: row.id.to_string(),
        })
}
