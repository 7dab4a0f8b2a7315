//! Apify actor-run scraper.
//!
//! Start run -> sleep -> poll status -> fetch dataset, bounded by a hard
//! timeout. A run that fails, aborts, or outlives the timeout produces
//! `Ok(None)` rather than an error.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::normalize::normalize_items;
use super::{Platform, ScrapedProfile, Scraper};
use crate::config::ApifyConfig;
use crate::error::ScrapeError;

/// Run status as reported by `GET /v2/actor-runs/{id}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Ready,
    Running,
    Succeeded,
    Failed,
    Aborted,
    TimedOut,
    Other(String),
}

impl RunStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "READY" => Self::Ready,
            "RUNNING" => Self::Running,
            "SUCCEEDED" => Self::Succeeded,
            "FAILED" => Self::Failed,
            "ABORTING" | "ABORTED" => Self::Aborted,
            "TIMING-OUT" | "TIMED-OUT" => Self::TimedOut,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::Aborted | Self::TimedOut
        )
    }
}

#[derive(Debug, Deserialize)]
struct RunEnvelope {
    data: RunInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunInfo {
    id: String,
    status: String,
    default_dataset_id: Option<String>,
}

/// Actor id and run input for a platform.
fn actor_for(platform: Platform, handle: &str, max_posts: usize) -> (&'static str, Value) {
    match platform {
        Platform::Instagram => (
            "apify~instagram-profile-scraper",
            json!({ "usernames": [handle], "resultsLimit": max_posts }),
        ),
        Platform::Tiktok => (
            "clockworks~tiktok-scraper",
            json!({ "profiles": [handle], "resultsPerPage": max_posts }),
        ),
        Platform::Twitter => (
            "apidojo~tweet-scraper",
            json!({ "twitterHandles": [handle], "maxItems": max_posts }),
        ),
    }
}

pub struct ApifyScraper {
    http: reqwest::Client,
    token: SecretString,
    base_url: String,
    poll_interval: Duration,
    timeout: Duration,
    max_posts: usize,
}

impl ApifyScraper {
    /// Build a scraper, or `None` when no token is configured.
    pub fn from_config(config: &ApifyConfig) -> Option<Self> {
        let token = config.token.clone()?;
        Some(Self {
            http: reqwest::Client::new(),
            token,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            poll_interval: config.poll_interval,
            timeout: config.timeout,
            max_posts: config.max_posts,
        })
    }

    fn request_failed(actor: &str, e: impl std::fmt::Display) -> ScrapeError {
        ScrapeError::RequestFailed {
            actor: actor.to_string(),
            reason: e.to_string(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        actor: &str,
        url: String,
    ) -> Result<T, ScrapeError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(self.token.expose_secret())
            .send()
            .await
            .map_err(|e| Self::request_failed(actor, e))?;
        if !response.status().is_success() {
            return Err(Self::request_failed(
                actor,
                format!("HTTP {}", response.status()),
            ));
        }
        response
            .json()
            .await
            .map_err(|e| ScrapeError::InvalidResponse {
                actor: actor.to_string(),
                reason: e.to_string(),
            })
    }

    async fn start_run(&self, actor: &str, input: &Value) -> Result<RunInfo, ScrapeError> {
        let response = self
            .http
            .post(format!("{}/v2/acts/{actor}/runs", self.base_url))
            .bearer_auth(self.token.expose_secret())
            .json(input)
            .send()
            .await
            .map_err(|e| Self::request_failed(actor, e))?;
        if !response.status().is_success() {
            return Err(Self::request_failed(
                actor,
                format!("start run: HTTP {}", response.status()),
            ));
        }
        let envelope: RunEnvelope =
            response
                .json()
                .await
                .map_err(|e| ScrapeError::InvalidResponse {
                    actor: actor.to_string(),
                    reason: e.to_string(),
                })?;
        Ok(envelope.data)
    }

    /// Best-effort abort so a timed-out run stops burning credits.
    async fn abort_run(&self, run_id: &str) {
        let result = self
            .http
            .post(format!("{}/v2/actor-runs/{run_id}/abort", self.base_url))
            .bearer_auth(self.token.expose_secret())
            .send()
            .await;
        if let Err(e) = result {
            debug!(run_id, error = %e, "Abort request failed");
        }
    }

    /// Poll until the run reaches a terminal state. `None` on timeout.
    async fn wait_for_run(&self, actor: &str, run: RunInfo) -> Result<Option<RunInfo>, ScrapeError> {
        let deadline = Instant::now() + self.timeout;
        let mut current = run;

        loop {
            let status = RunStatus::parse(&current.status);
            if status.is_terminal() {
                return Ok(Some(current));
            }
            if Instant::now() + self.poll_interval > deadline {
                warn!(actor, run_id = %current.id, "Actor run timed out");
                self.abort_run(&current.id).await;
                return Ok(None);
            }

            tokio::time::sleep(self.poll_interval).await;

            let envelope: RunEnvelope = self
                .get_json(actor, format!("{}/v2/actor-runs/{}", self.base_url, current.id))
                .await?;
            debug!(actor, run_id = %envelope.data.id, status = %envelope.data.status, "Polled actor run");
            current = envelope.data;
        }
    }
}

#[async_trait]
impl Scraper for ApifyScraper {
    async fn scrape(
        &self,
        platform: Platform,
        handle: &str,
    ) -> Result<Option<ScrapedProfile>, ScrapeError> {
        let (actor, input) = actor_for(platform, handle, self.max_posts);
        info!(%platform, handle, actor, "Starting scrape job");

        let run = self.start_run(actor, &input).await?;
        let Some(run) = self.wait_for_run(actor, run).await? else {
            return Ok(None);
        };

        if RunStatus::parse(&run.status) != RunStatus::Succeeded {
            warn!(actor, run_id = %run.id, status = %run.status, "Actor run did not succeed");
            return Ok(None);
        }

        let Some(dataset_id) = run.default_dataset_id else {
            warn!(actor, run_id = %run.id, "Actor run has no dataset");
            return Ok(None);
        };

        let items: Vec<Value> = self
            .get_json(
                actor,
                format!(
                    "{}/v2/datasets/{dataset_id}/items?clean=true&format=json",
                    self.base_url
                ),
            )
            .await?;

        let profile = normalize_items(platform, handle, &items, self.max_posts);
        info!(
            %platform,
            handle,
            items = items.len(),
            posts = profile.as_ref().map(|p| p.posts.len()).unwrap_or(0),
            "Scrape job finished"
        );
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::extract::State;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use tokio::net::TcpListener;

    async fn fake_apify(final_status: &'static str, polls_before_done: usize) -> String {
        let polls = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route(
                "/v2/acts/{actor}/runs",
                post(|| async {
                    Json(json!({"data": {"id": "run1", "status": "READY", "defaultDatasetId": "ds1"}}))
                }),
            )
            .route(
                "/v2/actor-runs/{id}",
                get(move |State(polls): State<Arc<AtomicUsize>>| async move {
                    let n = polls.fetch_add(1, Ordering::SeqCst);
                    let status = if n >= polls_before_done { final_status } else { "RUNNING" };
                    Json(json!({"data": {"id": "run1", "status": status, "defaultDatasetId": "ds1"}}))
                }),
            )
            .route("/v2/actor-runs/{id}/abort", post(|| async { Json(json!({})) }))
            .route(
                "/v2/datasets/{id}/items",
                get(|| async {
                    Json(json!([{
                        "fullName": "Jane",
                        "biography": "gardener",
                        "latestPosts": [{"caption": "tomatoes!", "hashtags": ["gardening"]}]
                    }]))
                }),
            )
            .with_state(polls);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn scraper(base_url: String, timeout: Duration) -> ApifyScraper {
        let config = ApifyConfig {
            token: Some(SecretString::from("apify-test")),
            base_url,
            poll_interval: Duration::from_millis(10),
            timeout,
            ..ApifyConfig::default()
        };
        ApifyScraper::from_config(&config).unwrap()
    }

    #[test]
    fn no_token_disables_scraper() {
        assert!(ApifyScraper::from_config(&ApifyConfig::default()).is_none());
    }

    #[test]
    fn terminal_statuses() {
        assert!(RunStatus::parse("SUCCEEDED").is_terminal());
        assert!(RunStatus::parse("TIMED-OUT").is_terminal());
        assert!(!RunStatus::parse("RUNNING").is_terminal());
        assert!(!RunStatus::parse("SOMETHING-NEW").is_terminal());
    }

    #[tokio::test]
    async fn successful_run_returns_profile() {
        let base = fake_apify("SUCCEEDED", 2).await;
        let profile = scraper(base, Duration::from_secs(5))
            .scrape(Platform::Instagram, "jane")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(profile.bio.as_deref(), Some("gardener"));
        assert_eq!(profile.posts[0].hashtags, vec!["gardening"]);
    }

    #[tokio::test]
    async fn failed_run_returns_none() {
        let base = fake_apify("FAILED", 0).await;
        let result = scraper(base, Duration::from_secs(5))
            .scrape(Platform::Tiktok, "someone")
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn timeout_returns_none() {
        let base = fake_apify("SUCCEEDED", usize::MAX).await;
        let result = scraper(base, Duration::from_millis(50))
            .scrape(Platform::Twitter, "slow")
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn unreachable_vendor_is_an_error() {
        let result = scraper("http://127.0.0.1:1".to_string(), Duration::from_secs(1))
            .scrape(Platform::Instagram, "jane")
            .await;
        assert!(matches!(result, Err(ScrapeError::RequestFailed { .. })));
    }
}
