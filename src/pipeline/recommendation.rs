//! Drives a recommendation session from handles to a saved shortlist.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::SearchConfig;
use crate::curation::Curator;
use crate::enrichment::EnrichmentEngine;
use crate::error::PipelineError;
use crate::llm::LlmProvider;
use crate::profile::ProfileInferer;
use crate::retail::{Budget, Retailer, SearchOrchestrator};
use crate::scrape::{ScrapedProfile, Scraper, scrape_social_profile};
use crate::store::{Database, GiftProduct, RecommendationSession, ScrapeStatus, SessionStatus};

/// Handles scraped at once for a single session.
const SCRAPE_CONCURRENCY: usize = 3;

/// Enrichment hints appended after the inferred gift ideas.
const EXTRA_HINTS: usize = 2;

pub struct RecommendationPipeline {
    db: Arc<dyn Database>,
    scraper: Option<Arc<dyn Scraper>>,
    enrichment: EnrichmentEngine,
    inferer: ProfileInferer,
    search: SearchOrchestrator,
    curator: Curator,
    cache_window: Duration,
}

impl RecommendationPipeline {
    pub fn new(
        db: Arc<dyn Database>,
        scraper: Option<Arc<dyn Scraper>>,
        llm: Arc<dyn LlmProvider>,
        retailers: Vec<Arc<dyn Retailer>>,
        search: SearchConfig,
        cache_window: Duration,
    ) -> Self {
        let curator = Curator::new(llm.clone(), search.shortlist_size, search.max_per_retailer);
        Self {
            db,
            scraper,
            enrichment: EnrichmentEngine::new(),
            inferer: ProfileInferer::new(llm),
            search: SearchOrchestrator::new(retailers, search),
            curator,
            cache_window,
        }
    }

    /// Run the pipeline in a background task.
    pub fn spawn(self: &Arc<Self>, session_id: Uuid) -> JoinHandle<()> {
        let pipeline = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = pipeline.run(session_id).await {
                error!(session_id = %session_id, error = %e, "Recommendation run failed");
            }
        })
    }

    /// Run every stage for one session, recording failure on the row.
    pub async fn run(&self, session_id: Uuid) -> Result<(), PipelineError> {
        let session = self
            .db
            .get_session(session_id)
            .await?
            .ok_or_else(|| PipelineError::SessionNotFound(session_id.to_string()))?;

        info!(
            session_id = %session_id,
            recipient = %session.recipient_name,
            handles = session.handles.len(),
            "Starting recommendation run"
        );

        match self.execute(&session).await {
            Ok(count) => {
                info!(session_id = %session_id, products = count, "Recommendation run completed");
                Ok(())
            }
            Err(e) => {
                self.db.fail_session(session_id, &e.to_string()).await?;
                Err(e)
            }
        }
    }

    async fn execute(&self, session: &RecommendationSession) -> Result<usize, PipelineError> {
        let id = session.id;
        let recipient = session.recipient();

        self.db
            .update_session_status(id, SessionStatus::Scraping)
            .await?;
        let scraped = self.scrape_handles(session).await?;

        let has_description = session
            .description
            .as_deref()
            .is_some_and(|d| !d.trim().is_empty());
        if scraped.is_empty() && !has_description {
            return Err(PipelineError::NoSignal {
                recipient: recipient.name,
            });
        }

        self.db
            .update_session_status(id, SessionStatus::Analyzing)
            .await?;
        let enrichment = self
            .enrichment
            .enrich(&scraped, session.description.as_deref());
        let profile = self.inferer.infer(&recipient, &scraped, &enrichment).await;
        self.db.set_gift_profile(id, &profile).await?;

        self.db
            .update_session_status(id, SessionStatus::Searching)
            .await?;
        let mut queries = profile.gift_ideas.clone();
        for hint in enrichment.search_hints(EXTRA_HINTS) {
            if !queries.iter().any(|q| q.eq_ignore_ascii_case(&hint)) {
                queries.push(hint);
            }
        }
        let budget = Budget::new(session.budget_min, session.budget_max);
        let candidates = self.search.search(&queries, budget).await;
        if candidates.is_empty() {
            return Err(PipelineError::NoCandidates);
        }

        self.db
            .update_session_status(id, SessionStatus::Curating)
            .await?;
        let shortlist = self.curator.curate(&recipient, &profile, &candidates).await;
        let products: Vec<GiftProduct> = shortlist
            .iter()
            .map(|gift| GiftProduct::from_curated(id, gift))
            .collect();
        self.db.replace_gift_products(id, &products).await?;

        self.db
            .update_session_status(id, SessionStatus::Completed)
            .await?;
        Ok(products.len())
    }

    /// Scrape every handle on the session, keeping the ones that produced data.
    async fn scrape_handles(
        &self,
        session: &RecommendationSession,
    ) -> Result<Vec<ScrapedProfile>, PipelineError> {
        if session.handles.is_empty() {
            return Ok(Vec::new());
        }
        let Some(scraper) = self.scraper.as_deref() else {
            warn!(session_id = %session.id, "Scraping disabled, skipping handles");
            return Ok(Vec::new());
        };

        let db = self.db.as_ref();
        let profile_id = session.profile_id;
        let cache_window = self.cache_window;
        let rows = stream::iter(session.handles.clone())
            .map(|h| async move {
                scrape_social_profile(db, scraper, profile_id, h.platform, &h.handle, cache_window)
                    .await
            })
            .buffered(SCRAPE_CONCURRENCY)
            .collect::<Vec<_>>()
            .await;

        // A failed re-scrape may still carry the previous payload; only
        // rows that completed this time count as signal.
        let mut scraped = Vec::new();
        for row in rows {
            let row = row?;
            if row.scrape_status == ScrapeStatus::Completed
                && let Some(data) = row.scraped_data
            {
                scraped.push(data);
            }
        }
        info!(
            session_id = %session.id,
            scraped = scraped.len(),
            requested = session.handles.len(),
            "Handles scraped"
        );
        Ok(scraped)
    }
}
