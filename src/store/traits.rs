//! Backend-agnostic `Database` trait.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::profile::GiftProfile;
use crate::scrape::{Platform, ScrapedProfile};
use crate::store::models::{
    GiftProduct, NewSession, Profile, RecommendationSession, ScrapeStatus, SessionStatus,
    SocialProfile,
};

/// Single async interface for all persistence.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Profiles ────────────────────────────────────────────────────

    async fn create_profile(
        &self,
        display_name: &str,
        email: Option<&str>,
    ) -> Result<Profile, DatabaseError>;

    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>, DatabaseError>;

    // ── Social profiles ─────────────────────────────────────────────

    /// Return the existing row for (profile, platform, handle) or insert a pending one.
    async fn upsert_social_profile(
        &self,
        profile_id: Uuid,
        platform: Platform,
        handle: &str,
    ) -> Result<SocialProfile, DatabaseError>;

    async fn get_social_profile(&self, id: Uuid) -> Result<Option<SocialProfile>, DatabaseError>;

    async fn list_social_profiles(
        &self,
        profile_id: Uuid,
    ) -> Result<Vec<SocialProfile>, DatabaseError>;

    /// Record a scrape outcome. `error` always replaces the stored message.
    /// `data` replaces the stored payload only when given, so a failed row may
    /// still carry the last good payload; readers must check `scrape_status`.
    /// `scraped_at` is set when the status is `Completed`.
    async fn update_scrape_status(
        &self,
        id: Uuid,
        status: ScrapeStatus,
        data: Option<&ScrapedProfile>,
        error: Option<&str>,
    ) -> Result<(), DatabaseError>;

    // ── Recommendation sessions ─────────────────────────────────────

    async fn create_session(
        &self,
        session: &NewSession,
    ) -> Result<RecommendationSession, DatabaseError>;

    async fn get_session(&self, id: Uuid) -> Result<Option<RecommendationSession>, DatabaseError>;

    /// Sessions for a profile, newest first.
    async fn list_sessions(
        &self,
        profile_id: Uuid,
    ) -> Result<Vec<RecommendationSession>, DatabaseError>;

    async fn update_session_status(
        &self,
        id: Uuid,
        status: SessionStatus,
    ) -> Result<(), DatabaseError>;

    async fn set_gift_profile(&self, id: Uuid, profile: &GiftProfile)
    -> Result<(), DatabaseError>;

    /// Mark a session failed with a message.
    async fn fail_session(&self, id: Uuid, error: &str) -> Result<(), DatabaseError>;

    // ── Gift products ───────────────────────────────────────────────

    /// Replace every product stored for the session.
    async fn replace_gift_products(
        &self,
        session_id: Uuid,
        products: &[GiftProduct],
    ) -> Result<(), DatabaseError>;

    /// Products for a session ordered by rank.
    async fn list_gift_products(&self, session_id: Uuid)
    -> Result<Vec<GiftProduct>, DatabaseError>;
}
