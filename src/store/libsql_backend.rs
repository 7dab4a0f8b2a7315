//! libSQL backend: async `Database` trait implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use rust_decimal::Decimal;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::profile::GiftProfile;
use crate::scrape::{Platform, ScrapedProfile};
use crate::store::migrations;
use crate::store::models::{
    GiftProduct, HandleRef, NewSession, Profile, RecommendationSession, ScrapeStatus,
    SessionStatus, SocialProfile,
};
use crate::store::traits::Database;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db)?;
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let backend = Self::from_database(db)?;
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

const PROFILE_COLUMNS: &str = "id, display_name, email, created_at, updated_at";

const SOCIAL_COLUMNS: &str = "id, profile_id, platform, handle, scrape_status, scraped_data, \
     error, scraped_at, created_at, updated_at";

const SESSION_COLUMNS: &str = "id, profile_id, recipient_name, relationship, occasion, \
     budget_min, budget_max, description, handles, status, gift_profile, error, created_at, updated_at";

const PRODUCT_COLUMNS: &str = "id, session_id, retailer, external_id, title, price, currency, \
     url, image_url, rating, reason, rank, created_at";

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn parse_uuid(s: &str) -> Result<Uuid, libsql::Error> {
    Uuid::parse_str(s).map_err(|e| libsql::Error::ConnectionFailed(format!("bad uuid {s}: {e}")))
}

fn parse_decimal(s: Option<String>) -> Option<Decimal> {
    s.and_then(|s| s.parse().ok())
}

/// Deserialize a JSON column, treating NULL or garbage as absent.
fn parse_json<T: serde::de::DeserializeOwned>(s: Option<String>) -> Option<T> {
    let raw = s?;
    match serde_json::from_str(&raw) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!("Ignoring unparseable JSON column: {e}");
            None
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, DatabaseError> {
    serde_json::to_string(value).map_err(|e| DatabaseError::Serialization(e.to_string()))
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

fn opt_text_owned(s: Option<String>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s),
        None => libsql::Value::Null,
    }
}

fn opt_real(v: Option<f32>) -> libsql::Value {
    match v {
        Some(v) => libsql::Value::Real(v as f64),
        None => libsql::Value::Null,
    }
}

/// Map constraint failures to `Constraint`, everything else to `Query`.
fn query_error(op: &str, e: libsql::Error) -> DatabaseError {
    let msg = e.to_string();
    if msg.contains("constraint failed") {
        DatabaseError::Constraint(format!("{op}: {msg}"))
    } else {
        DatabaseError::Query(format!("{op}: {msg}"))
    }
}

fn row_to_profile(row: &libsql::Row) -> Result<Profile, libsql::Error> {
    let id: String = row.get(0)?;
    let created: String = row.get(3)?;
    let updated: String = row.get(4)?;
    Ok(Profile {
        id: parse_uuid(&id)?,
        display_name: row.get(1)?,
        email: row.get::<String>(2).ok(),
        created_at: parse_datetime(&created),
        updated_at: parse_datetime(&updated),
    })
}

fn row_to_social(row: &libsql::Row) -> Result<SocialProfile, libsql::Error> {
    let id: String = row.get(0)?;
    let profile_id: String = row.get(1)?;
    let platform: String = row.get(2)?;
    let status: String = row.get(4)?;
    let scraped_at: Option<String> = row.get::<String>(7).ok();
    let created: String = row.get(8)?;
    let updated: String = row.get(9)?;

    Ok(SocialProfile {
        id: parse_uuid(&id)?,
        profile_id: parse_uuid(&profile_id)?,
        platform: platform
            .parse::<Platform>()
            .map_err(|e| libsql::Error::ConnectionFailed(e.to_string()))?,
        handle: row.get(3)?,
        scrape_status: ScrapeStatus::parse(&status),
        scraped_data: parse_json::<ScrapedProfile>(row.get::<String>(5).ok()),
        error: row.get::<String>(6).ok(),
        scraped_at: scraped_at.as_deref().map(parse_datetime),
        created_at: parse_datetime(&created),
        updated_at: parse_datetime(&updated),
    })
}

fn row_to_session(row: &libsql::Row) -> Result<RecommendationSession, libsql::Error> {
    let id: String = row.get(0)?;
    let profile_id: String = row.get(1)?;
    let status: String = row.get(9)?;
    let created: String = row.get(12)?;
    let updated: String = row.get(13)?;

    Ok(RecommendationSession {
        id: parse_uuid(&id)?,
        profile_id: parse_uuid(&profile_id)?,
        recipient_name: row.get(2)?,
        relationship: row.get::<String>(3).ok(),
        occasion: row.get::<String>(4).ok(),
        budget_min: parse_decimal(row.get::<String>(5).ok()),
        budget_max: parse_decimal(row.get::<String>(6).ok()),
        description: row.get::<String>(7).ok(),
        handles: parse_json::<Vec<HandleRef>>(row.get::<String>(8).ok()).unwrap_or_default(),
        status: SessionStatus::parse(&status),
        gift_profile: parse_json::<GiftProfile>(row.get::<String>(10).ok()),
        error: row.get::<String>(11).ok(),
        created_at: parse_datetime(&created),
        updated_at: parse_datetime(&updated),
    })
}

fn row_to_product(row: &libsql::Row) -> Result<GiftProduct, libsql::Error> {
    let id: String = row.get(0)?;
    let session_id: String = row.get(1)?;
    let price: String = row.get(5)?;
    let rank: i64 = row.get(11)?;
    let created: String = row.get(12)?;

    Ok(GiftProduct {
        id: parse_uuid(&id)?,
        session_id: parse_uuid(&session_id)?,
        retailer: row.get(2)?,
        external_id: row.get(3)?,
        title: row.get(4)?,
        price: price.parse().unwrap_or(Decimal::ZERO),
        currency: row.get(6)?,
        url: row.get(7)?,
        image_url: row.get::<String>(8).ok(),
        rating: row.get::<f64>(9).ok().map(|r| r as f32),
        reason: row.get(10)?,
        rank: rank.max(0) as u32,
        created_at: parse_datetime(&created),
    })
}

impl LibSqlBackend {
    /// Run a query and map every row, skipping rows that fail to parse.
    async fn query_all<T>(
        &self,
        op: &str,
        sql: &str,
        params: impl libsql::params::IntoParams,
        map: fn(&libsql::Row) -> Result<T, libsql::Error>,
    ) -> Result<Vec<T>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(sql, params)
            .await
            .map_err(|e| query_error(op, e))?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| query_error(op, e))? {
            match map(&row) {
                Ok(item) => out.push(item),
                Err(e) => tracing::warn!(op, "Skipping row: {e}"),
            }
        }
        Ok(out)
    }

    async fn query_one<T>(
        &self,
        op: &str,
        sql: &str,
        params: impl libsql::params::IntoParams,
        map: fn(&libsql::Row) -> Result<T, libsql::Error>,
    ) -> Result<Option<T>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(sql, params)
            .await
            .map_err(|e| query_error(op, e))?;

        match rows.next().await.map_err(|e| query_error(op, e))? {
            Some(row) => map(&row)
                .map(Some)
                .map_err(|e| DatabaseError::Query(format!("{op}: row parse: {e}"))),
            None => Ok(None),
        }
    }

    /// Execute an UPDATE and turn "no rows touched" into `NotFound`.
    async fn update_one(
        &self,
        op: &str,
        entity: &str,
        id: Uuid,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<(), DatabaseError> {
        let changed = self
            .conn()
            .execute(sql, params)
            .await
            .map_err(|e| query_error(op, e))?;
        if changed == 0 {
            return Err(DatabaseError::NotFound {
                entity: entity.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::init_schema(self.conn()).await
    }

    // ── Profiles ────────────────────────────────────────────────────

    async fn create_profile(
        &self,
        display_name: &str,
        email: Option<&str>,
    ) -> Result<Profile, DatabaseError> {
        let now = Utc::now();
        let profile = Profile {
            id: Uuid::new_v4(),
            display_name: display_name.to_string(),
            email: email.map(String::from),
            created_at: now,
            updated_at: now,
        };
        self.conn()
            .execute(
                "INSERT INTO profiles (id, display_name, email, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                params![
                    profile.id.to_string(),
                    display_name,
                    opt_text(email),
                    now.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| query_error("create_profile", e))?;

        debug!(id = %profile.id, "Profile created");
        Ok(profile)
    }

    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>, DatabaseError> {
        self.query_one(
            "get_profile",
            &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ?1"),
            params![id.to_string()],
            row_to_profile,
        )
        .await
    }

    // ── Social profiles ─────────────────────────────────────────────

    async fn upsert_social_profile(
        &self,
        profile_id: Uuid,
        platform: Platform,
        handle: &str,
    ) -> Result<SocialProfile, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "INSERT INTO social_profiles (id, profile_id, platform, handle, scrape_status,
                    created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, 'pending', ?5, ?5)
                 ON CONFLICT (profile_id, platform, handle) DO NOTHING",
                params![
                    Uuid::new_v4().to_string(),
                    profile_id.to_string(),
                    platform.as_str(),
                    handle,
                    now,
                ],
            )
            .await
            .map_err(|e| query_error("upsert_social_profile", e))?;

        self.query_one(
            "upsert_social_profile",
            &format!(
                "SELECT {SOCIAL_COLUMNS} FROM social_profiles
                 WHERE profile_id = ?1 AND platform = ?2 AND handle = ?3"
            ),
            params![profile_id.to_string(), platform.as_str(), handle],
            row_to_social,
        )
        .await?
        .ok_or_else(|| DatabaseError::NotFound {
            entity: "social_profile".to_string(),
            id: format!("{profile_id}/{platform}/{handle}"),
        })
    }

    async fn get_social_profile(&self, id: Uuid) -> Result<Option<SocialProfile>, DatabaseError> {
        self.query_one(
            "get_social_profile",
            &format!("SELECT {SOCIAL_COLUMNS} FROM social_profiles WHERE id = ?1"),
            params![id.to_string()],
            row_to_social,
        )
        .await
    }

    async fn list_social_profiles(
        &self,
        profile_id: Uuid,
    ) -> Result<Vec<SocialProfile>, DatabaseError> {
        self.query_all(
            "list_social_profiles",
            &format!(
                "SELECT {SOCIAL_COLUMNS} FROM social_profiles
                 WHERE profile_id = ?1 ORDER BY created_at ASC"
            ),
            params![profile_id.to_string()],
            row_to_social,
        )
        .await
    }

    async fn update_scrape_status(
        &self,
        id: Uuid,
        status: ScrapeStatus,
        data: Option<&ScrapedProfile>,
        error: Option<&str>,
    ) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let data_json = data.map(to_json).transpose()?;
        let scraped_at = (status == ScrapeStatus::Completed).then(|| now.clone());

        self.update_one(
            "update_scrape_status",
            "social_profile",
            id,
            "UPDATE social_profiles
             SET scrape_status = ?1,
                 scraped_data = COALESCE(?2, scraped_data),
                 error = ?3,
                 scraped_at = COALESCE(?4, scraped_at),
                 updated_at = ?5
             WHERE id = ?6",
            params![
                status.as_str(),
                opt_text_owned(data_json),
                opt_text(error),
                opt_text_owned(scraped_at),
                now,
                id.to_string(),
            ],
        )
        .await
    }

    // ── Recommendation sessions ─────────────────────────────────────

    async fn create_session(
        &self,
        session: &NewSession,
    ) -> Result<RecommendationSession, DatabaseError> {
        let now = Utc::now();
        let row = RecommendationSession {
            id: Uuid::new_v4(),
            profile_id: session.profile_id,
            recipient_name: session.recipient_name.clone(),
            relationship: session.relationship.clone(),
            occasion: session.occasion.clone(),
            budget_min: session.budget_min,
            budget_max: session.budget_max,
            description: session.description.clone(),
            handles: session.handles.clone(),
            status: SessionStatus::Pending,
            gift_profile: None,
            error: None,
            created_at: now,
            updated_at: now,
        };

        self.conn()
            .execute(
                "INSERT INTO recommendation_sessions (id, profile_id, recipient_name, relationship,
                    occasion, budget_min, budget_max, description, handles, status,
                    created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'pending', ?10, ?10)",
                params![
                    row.id.to_string(),
                    row.profile_id.to_string(),
                    row.recipient_name.clone(),
                    opt_text(row.relationship.as_deref()),
                    opt_text(row.occasion.as_deref()),
                    opt_text_owned(row.budget_min.map(|d| d.to_string())),
                    opt_text_owned(row.budget_max.map(|d| d.to_string())),
                    opt_text(row.description.as_deref()),
                    to_json(&row.handles)?,
                    now.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| query_error("create_session", e))?;

        debug!(id = %row.id, recipient = %row.recipient_name, "Session created");
        Ok(row)
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<RecommendationSession>, DatabaseError> {
        self.query_one(
            "get_session",
            &format!("SELECT {SESSION_COLUMNS} FROM recommendation_sessions WHERE id = ?1"),
            params![id.to_string()],
            row_to_session,
        )
        .await
    }

    async fn list_sessions(
        &self,
        profile_id: Uuid,
    ) -> Result<Vec<RecommendationSession>, DatabaseError> {
        self.query_all(
            "list_sessions",
            &format!(
                "SELECT {SESSION_COLUMNS} FROM recommendation_sessions
                 WHERE profile_id = ?1 ORDER BY created_at DESC"
            ),
            params![profile_id.to_string()],
            row_to_session,
        )
        .await
    }

    async fn update_session_status(
        &self,
        id: Uuid,
        status: SessionStatus,
    ) -> Result<(), DatabaseError> {
        self.update_one(
            "update_session_status",
            "recommendation_session",
            id,
            "UPDATE recommendation_sessions SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), Utc::now().to_rfc3339(), id.to_string()],
        )
        .await
    }

    async fn set_gift_profile(
        &self,
        id: Uuid,
        profile: &GiftProfile,
    ) -> Result<(), DatabaseError> {
        self.update_one(
            "set_gift_profile",
            "recommendation_session",
            id,
            "UPDATE recommendation_sessions SET gift_profile = ?1, updated_at = ?2 WHERE id = ?3",
            params![to_json(profile)?, Utc::now().to_rfc3339(), id.to_string()],
        )
        .await
    }

    async fn fail_session(&self, id: Uuid, error: &str) -> Result<(), DatabaseError> {
        self.update_one(
            "fail_session",
            "recommendation_session",
            id,
            "UPDATE recommendation_sessions
             SET status = 'failed', error = ?1, updated_at = ?2 WHERE id = ?3",
            params![error, Utc::now().to_rfc3339(), id.to_string()],
        )
        .await
    }

    // ── Gift products ───────────────────────────────────────────────

    async fn replace_gift_products(
        &self,
        session_id: Uuid,
        products: &[GiftProduct],
    ) -> Result<(), DatabaseError> {
        let conn = self.conn();
        conn.execute(
            "DELETE FROM gift_products WHERE session_id = ?1",
            params![session_id.to_string()],
        )
        .await
        .map_err(|e| query_error("replace_gift_products", e))?;

        for product in products {
            conn.execute(
                "INSERT INTO gift_products (id, session_id, retailer, external_id, title, price,
                    currency, url, image_url, rating, reason, rank, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    product.id.to_string(),
                    session_id.to_string(),
                    product.retailer.clone(),
                    product.external_id.clone(),
                    product.title.clone(),
                    product.price.to_string(),
                    product.currency.clone(),
                    product.url.clone(),
                    opt_text(product.image_url.as_deref()),
                    opt_real(product.rating),
                    product.reason.clone(),
                    product.rank as i64,
                    product.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| query_error("replace_gift_products", e))?;
        }

        debug!(session_id = %session_id, count = products.len(), "Gift products stored");
        Ok(())
    }

    async fn list_gift_products(
        &self,
        session_id: Uuid,
    ) -> Result<Vec<GiftProduct>, DatabaseError> {
        self.query_all(
            "list_gift_products",
            &format!(
                "SELECT {PRODUCT_COLUMNS} FROM gift_products WHERE session_id = ?1 ORDER BY rank ASC"
            ),
            params![session_id.to_string()],
            row_to_product,
        )
        .await
    }
}
