//! HTTP API: profiles, social scrapes and recommendation sessions.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::ScrapeError;
use crate::pipeline::RecommendationPipeline;
use crate::scrape::{Platform, Scraper, normalize_handle, scrape_social_profile};
use crate::store::{
    Database, GiftProduct, HandleRef, NewSession, RecommendationSession, ScrapeStatus,
};

/// Handles accepted on a single session.
const MAX_HANDLES: usize = 5;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn Database>,
    /// `None` when no Apify token is configured.
    pub scraper: Option<Arc<dyn Scraper>>,
    pub pipeline: Arc<RecommendationPipeline>,
    pub cache_window: Duration,
}

/// Build the API router.
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/profiles", post(create_profile))
        .route("/api/profiles/{id}", get(get_profile))
        .route("/api/profiles/{id}/social-profiles", get(list_social_profiles))
        .route("/api/profiles/{id}/sessions", get(list_sessions))
        .route("/api/social-profiles/scrape", post(scrape_profile))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/{id}", get(get_session))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

type ApiResult = Result<Response, Response>;

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

fn internal_error(context: &str, e: impl std::fmt::Display) -> Response {
    error!(context, error = %e, "Request failed");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}

fn parse_id(raw: &str, what: &str) -> Result<Uuid, Response> {
    Uuid::parse_str(raw)
        .map_err(|_| error_response(StatusCode::BAD_REQUEST, format!("Invalid {what} ID")))
}

fn parse_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| error_response(StatusCode::BAD_REQUEST, rejection.body_text()))
}

/// 404 unless the profile exists.
async fn require_profile(state: &AppState, id: Uuid) -> Result<(), Response> {
    match state.db.get_profile(id).await {
        Ok(Some(_)) => Ok(()),
        Ok(None) => Err(error_response(StatusCode::NOT_FOUND, "Profile not found")),
        Err(e) => Err(internal_error("get_profile", e)),
    }
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "giftwise"
    }))
}

// ── Profiles ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CreateProfileRequest {
    display_name: String,
    #[serde(default)]
    email: Option<String>,
}

async fn create_profile(
    State(state): State<AppState>,
    payload: Result<Json<CreateProfileRequest>, JsonRejection>,
) -> ApiResult {
    let body = parse_body(payload)?;
    let name = body.display_name.trim();
    if name.is_empty() {
        return Err(error_response(StatusCode::BAD_REQUEST, "display_name is required"));
    }
    let email = body.email.as_deref().map(str::trim).filter(|e| !e.is_empty());

    let profile = state
        .db
        .create_profile(name, email)
        .await
        .map_err(|e| internal_error("create_profile", e))?;
    info!(profile_id = %profile.id, "Profile created");
    Ok((StatusCode::CREATED, Json(profile)).into_response())
}

async fn get_profile(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let id = parse_id(&id, "profile")?;
    match state.db.get_profile(id).await {
        Ok(Some(profile)) => Ok(Json(profile).into_response()),
        Ok(None) => Err(error_response(StatusCode::NOT_FOUND, "Profile not found")),
        Err(e) => Err(internal_error("get_profile", e)),
    }
}

async fn list_social_profiles(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult {
    let id = parse_id(&id, "profile")?;
    require_profile(&state, id).await?;
    let rows = state
        .db
        .list_social_profiles(id)
        .await
        .map_err(|e| internal_error("list_social_profiles", e))?;
    Ok(Json(rows).into_response())
}

async fn list_sessions(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let id = parse_id(&id, "profile")?;
    require_profile(&state, id).await?;
    let sessions = state
        .db
        .list_sessions(id)
        .await
        .map_err(|e| internal_error("list_sessions", e))?;
    Ok(Json(sessions).into_response())
}

// ── Scraping ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct HandleInput {
    platform: String,
    handle: String,
}

impl HandleInput {
    fn normalize(&self) -> Result<HandleRef, ScrapeError> {
        let platform: Platform = self.platform.parse()?;
        Ok(HandleRef {
            platform,
            handle: normalize_handle(platform, &self.handle)?,
        })
    }
}

#[derive(Deserialize)]
struct ScrapeRequest {
    profile_id: String,
    #[serde(flatten)]
    target: HandleInput,
}

/// POST /api/social-profiles/scrape
///
/// Runs the scrape inline and returns the recorded row. A job that ends
/// without data answers 502 with the row attached.
async fn scrape_profile(
    State(state): State<AppState>,
    payload: Result<Json<ScrapeRequest>, JsonRejection>,
) -> ApiResult {
    let body = parse_body(payload)?;
    let profile_id = parse_id(&body.profile_id, "profile")?;
    let target = body
        .target
        .normalize()
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, e.to_string()))?;
    let Some(scraper) = state.scraper.as_deref() else {
        return Err(error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            ScrapeError::Disabled.to_string(),
        ));
    };
    require_profile(&state, profile_id).await?;

    let row = scrape_social_profile(
        state.db.as_ref(),
        scraper,
        profile_id,
        target.platform,
        &target.handle,
        state.cache_window,
    )
    .await
    .map_err(|e| internal_error("scrape_social_profile", e))?;

    if row.scrape_status == ScrapeStatus::Failed {
        warn!(platform = %row.platform, handle = %row.handle, "Scrape request failed");
        let message = row.error.clone().unwrap_or_else(|| "Scrape failed".to_string());
        return Err((
            StatusCode::BAD_GATEWAY,
            Json(json!({ "error": message, "social_profile": row })),
        )
            .into_response());
    }
    Ok(Json(row).into_response())
}

// ── Sessions ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CreateSessionRequest {
    profile_id: String,
    recipient_name: String,
    #[serde(default)]
    relationship: Option<String>,
    #[serde(default)]
    occasion: Option<String>,
    #[serde(default)]
    budget_min: Option<Decimal>,
    #[serde(default)]
    budget_max: Option<Decimal>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    handles: Vec<HandleInput>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl CreateSessionRequest {
    fn validate(self, profile_id: Uuid) -> Result<NewSession, String> {
        let recipient_name = self.recipient_name.trim().to_string();
        if recipient_name.is_empty() {
            return Err("recipient_name is required".to_string());
        }
        for bound in [self.budget_min, self.budget_max].into_iter().flatten() {
            if bound.is_sign_negative() {
                return Err("budget must not be negative".to_string());
            }
        }
        if let (Some(min), Some(max)) = (self.budget_min, self.budget_max)
            && min > max
        {
            return Err("budget_min must not exceed budget_max".to_string());
        }
        if self.handles.len() > MAX_HANDLES {
            return Err(format!("at most {MAX_HANDLES} handles per session"));
        }

        let mut handles: Vec<HandleRef> = Vec::with_capacity(self.handles.len());
        for input in &self.handles {
            let handle = input.normalize().map_err(|e| e.to_string())?;
            if !handles.contains(&handle) {
                handles.push(handle);
            }
        }

        let description = non_blank(self.description);
        if handles.is_empty() && description.is_none() {
            return Err("provide at least one handle or a description".to_string());
        }

        Ok(NewSession {
            profile_id,
            recipient_name,
            relationship: non_blank(self.relationship),
            occasion: non_blank(self.occasion),
            budget_min: self.budget_min,
            budget_max: self.budget_max,
            description,
            handles,
        })
    }
}

/// POST /api/sessions
///
/// Stores the session and starts the pipeline in the background.
async fn create_session(
    State(state): State<AppState>,
    payload: Result<Json<CreateSessionRequest>, JsonRejection>,
) -> ApiResult {
    let body = parse_body(payload)?;
    let profile_id = parse_id(&body.profile_id, "profile")?;
    let new_session = body
        .validate(profile_id)
        .map_err(|message| error_response(StatusCode::BAD_REQUEST, message))?;
    require_profile(&state, profile_id).await?;

    let session = state
        .db
        .create_session(&new_session)
        .await
        .map_err(|e| internal_error("create_session", e))?;

    state.pipeline.spawn(session.id);
    info!(session_id = %session.id, "Recommendation session queued");
    Ok((StatusCode::ACCEPTED, Json(session)).into_response())
}

/// A session with its shortlist.
#[derive(Serialize)]
struct SessionView {
    #[serde(flatten)]
    session: RecommendationSession,
    products: Vec<GiftProduct>,
}

async fn get_session(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let id = parse_id(&id, "session")?;
    let session = match state.db.get_session(id).await {
        Ok(Some(session)) => session,
        Ok(None) => return Err(error_response(StatusCode::NOT_FOUND, "Session not found")),
        Err(e) => return Err(internal_error("get_session", e)),
    };
    let products = state
        .db
        .list_gift_products(id)
        .await
        .map_err(|e| internal_error("list_gift_products", e))?;
    Ok(Json(SessionView { session, products }).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::config::SearchConfig;
    use crate::error::LlmError;
    use crate::llm::{CompletionRequest, CompletionResponse, LlmProvider};
    use crate::scrape::ScrapedProfile;
    use crate::store::LibSqlBackend;

    struct DownLlm;

    #[async_trait]
    impl LlmProvider for DownLlm {
        fn model_name(&self) -> &str {
            "down"
        }

        fn cost_per_token(&self) -> (Decimal, Decimal) {
            (Decimal::ZERO, Decimal::ZERO)
        }

        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            Err(LlmError::RequestFailed {
                provider: "down".into(),
                reason: "offline".into(),
            })
        }
    }

    struct EmptyScraper;

    #[async_trait]
    impl Scraper for EmptyScraper {
        async fn scrape(
            &self,
            _platform: Platform,
            _handle: &str,
        ) -> Result<Option<ScrapedProfile>, ScrapeError> {
            Ok(None)
        }
    }

    async fn app(scraper: Option<Arc<dyn Scraper>>) -> (Router, Arc<dyn Database>) {
        let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let pipeline = Arc::new(RecommendationPipeline::new(
            Arc::clone(&db),
            scraper.clone(),
            Arc::new(DownLlm),
            Vec::new(),
            SearchConfig::default(),
            Duration::from_secs(60),
        ));
        let state = AppState {
            db: Arc::clone(&db),
            scraper,
            pipeline,
            cache_window: Duration::from_secs(60),
        };
        (api_routes(state), db)
    }

    async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let request = match body {
            Some(body) => request.body(Body::from(body.to_string())).unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (router, _) = app(None).await;
        let (status, body) = send(&router, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn profile_create_and_fetch() {
        let (router, _) = app(None).await;
        let (status, created) = send(
            &router,
            "POST",
            "/api/profiles",
            Some(json!({"display_name": "Jo", "email": "jo@example.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let id = created["id"].as_str().unwrap();
        let (status, fetched) = send(&router, "GET", &format!("/api/profiles/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["display_name"], "Jo");
    }

    #[tokio::test]
    async fn profile_validation_and_lookup_errors() {
        let (router, _) = app(None).await;
        let (status, _) = send(&router, "POST", "/api/profiles", Some(json!({"display_name": "  "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&router, "POST", "/api/profiles", Some(json!({"nope": 1}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&router, "GET", "/api/profiles/not-a-uuid", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) =
            send(&router, "GET", &format!("/api/profiles/{}", Uuid::new_v4()), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Profile not found");
    }

    #[tokio::test]
    async fn scrape_disabled_without_scraper() {
        let (router, db) = app(None).await;
        let profile = db.create_profile("Jo", None).await.unwrap();
        let (status, _) = send(
            &router,
            "POST",
            "/api/social-profiles/scrape",
            Some(json!({"profile_id": profile.id, "platform": "instagram", "handle": "jo"})),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn failed_scrape_is_bad_gateway_and_recorded() {
        let (router, db) = app(Some(Arc::new(EmptyScraper))).await;
        let profile = db.create_profile("Jo", None).await.unwrap();
        let (status, body) = send(
            &router,
            "POST",
            "/api/social-profiles/scrape",
            Some(json!({"profile_id": profile.id, "platform": "x", "handle": "@jo"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["social_profile"]["scrape_status"], "failed");
        assert_eq!(body["social_profile"]["platform"], "twitter");

        let (status, rows) = send(
            &router,
            "GET",
            &format!("/api/profiles/{}/social-profiles", profile.id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(rows.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn scrape_rejects_unknown_platform() {
        let (router, db) = app(Some(Arc::new(EmptyScraper))).await;
        let profile = db.create_profile("Jo", None).await.unwrap();
        let (status, body) = send(
            &router,
            "POST",
            "/api/social-profiles/scrape",
            Some(json!({"profile_id": profile.id, "platform": "myspace", "handle": "jo"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("myspace"));
    }

    #[tokio::test]
    async fn session_is_accepted_and_listed() {
        let (router, db) = app(None).await;
        let profile = db.create_profile("Jo", None).await.unwrap();
        let (status, session) = send(
            &router,
            "POST",
            "/api/sessions",
            Some(json!({
                "profile_id": profile.id,
                "recipient_name": "Dad",
                "occasion": "birthday",
                "budget_min": 20,
                "budget_max": "80.00",
                "description": "Likes golf",
                "handles": [{"platform": "instagram", "handle": "https://instagram.com/dad_golfs"}]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(session["status"], "pending");
        assert_eq!(session["handles"][0]["handle"], "dad_golfs");

        let (status, listed) = send(
            &router,
            "GET",
            &format!("/api/profiles/{}/sessions", profile.id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let id = session["id"].as_str().unwrap();
        let (status, detail) = send(&router, "GET", &format!("/api/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(detail["recipient_name"], "Dad");
        assert!(detail["products"].is_array());
    }

    #[tokio::test]
    async fn session_validation() {
        let (router, db) = app(None).await;
        let profile = db.create_profile("Jo", None).await.unwrap();

        let cases = [
            json!({"profile_id": profile.id, "recipient_name": "", "description": "x"}),
            json!({"profile_id": profile.id, "recipient_name": "Dad"}),
            json!({"profile_id": profile.id, "recipient_name": "Dad", "description": "x",
                   "budget_min": 50, "budget_max": 10}),
            json!({"profile_id": profile.id, "recipient_name": "Dad", "description": "x",
                   "budget_max": -1}),
            json!({"profile_id": profile.id, "recipient_name": "Dad",
                   "handles": [{"platform": "instagram", "handle": "bad handle"}]}),
            json!({"profile_id": "nope", "recipient_name": "Dad", "description": "x"}),
        ];
        for case in cases {
            let (status, _) = send(&router, "POST", "/api/sessions", Some(case.clone())).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "case: {case}");
        }

        let (status, _) = send(
            &router,
            "POST",
            "/api/sessions",
            Some(json!({"profile_id": Uuid::new_v4(), "recipient_name": "Dad", "description": "x"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let (router, _) = app(None).await;
        let (status, _) =
            send(&router, "GET", &format!("/api/sessions/{}", Uuid::new_v4()), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
