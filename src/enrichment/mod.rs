//! Enrichment engine: deterministic keyword lookup over scraped text.
//!
//! No learning and no state. Each keyword counts at most once per text
//! (a post, or a bio), so one spammy caption cannot dominate a profile.

pub mod dictionary;

use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::scrape::ScrapedProfile;

use dictionary::{BRANDS, CATEGORIES};

static HASHTAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#([\p{L}\p{N}_]+)").expect("valid hashtag regex"));

const TOP_HASHTAGS: usize = 10;

/// How strongly one category showed up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterestSignal {
    pub category: String,
    pub score: u32,
    pub matched_keywords: Vec<String>,
}

/// Output of the enrichment pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Enrichment {
    /// Sorted by score descending, then category name.
    pub interests: Vec<InterestSignal>,
    pub brands: Vec<String>,
    pub top_hashtags: Vec<String>,
}

impl Enrichment {
    pub fn is_empty(&self) -> bool {
        self.interests.is_empty() && self.brands.is_empty() && self.top_hashtags.is_empty()
    }

    /// Search hints for the top `n` categories.
    pub fn search_hints(&self, n: usize) -> Vec<String> {
        self.interests
            .iter()
            .take(n)
            .filter_map(|signal| {
                CATEGORIES
                    .iter()
                    .find(|c| c.name == signal.category)
                    .map(|c| c.search_hint.to_string())
            })
            .collect()
    }
}

/// Extract `#tags` from free text, lowercased.
pub fn extract_hashtags(text: &str) -> Vec<String> {
    HASHTAG_RE
        .captures_iter(text)
        .map(|c| c[1].to_lowercase())
        .collect()
}

#[derive(Debug, Default, Clone, Copy)]
pub struct EnrichmentEngine;

impl EnrichmentEngine {
    pub fn new() -> Self {
        Self
    }

    /// Run the lookup over every profile plus an optional free-text description.
    pub fn enrich(&self, profiles: &[ScrapedProfile], description: Option<&str>) -> Enrichment {
        let mut texts: Vec<String> = Vec::new();
        let mut hashtag_counts: HashMap<String, u32> = HashMap::new();

        for profile in profiles {
            if let Some(bio) = &profile.bio {
                texts.push(bio.to_lowercase());
            }
            for post in &profile.posts {
                let mut tags = post.hashtags.clone();
                if tags.is_empty() {
                    tags = extract_hashtags(&post.text);
                }
                for tag in &tags {
                    *hashtag_counts.entry(tag.clone()).or_default() += 1;
                }
                texts.push(format!("{} {}", post.text.to_lowercase(), tags.join(" ")));
            }
        }
        if let Some(desc) = description.filter(|d| !d.trim().is_empty()) {
            texts.push(desc.to_lowercase());
        }

        Enrichment {
            interests: score_categories(&texts),
            brands: find_brands(&texts),
            top_hashtags: top_hashtags(hashtag_counts),
        }
    }
}

fn score_categories(texts: &[String]) -> Vec<InterestSignal> {
    let mut signals: Vec<InterestSignal> = CATEGORIES
        .iter()
        .filter_map(|category| {
            let mut score = 0;
            let mut matched: Vec<String> = Vec::new();
            for keyword in category.keywords {
                let hits = texts.iter().filter(|t| t.contains(keyword)).count() as u32;
                if hits > 0 {
                    score += hits;
                    matched.push((*keyword).to_string());
                }
            }
            (score > 0).then(|| InterestSignal {
                category: category.name.to_string(),
                score,
                matched_keywords: matched,
            })
        })
        .collect();

    signals.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.category.cmp(&b.category)));
    signals
}

fn find_brands(texts: &[String]) -> Vec<String> {
    BRANDS
        .iter()
        .filter(|brand| {
            let needle = brand.to_lowercase();
            texts.iter().any(|t| t.contains(&needle))
        })
        .map(|b| (*b).to_string())
        .collect()
}

fn top_hashtags(counts: HashMap<String, u32>) -> Vec<String> {
    // BTreeMap first so ties break alphabetically.
    let ordered: BTreeMap<String, u32> = counts.into_iter().collect();
    let mut tags: Vec<(String, u32)> = ordered.into_iter().collect();
    tags.sort_by(|a, b| b.1.cmp(&a.1));
    tags.into_iter().take(TOP_HASHTAGS).map(|(t, _)| t).collect()
}
