//! Shortlist curation: one LLM pass over the candidate pool.

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::llm::{ChatMessage, CompletionRequest, LlmProvider, extract_json_array};
use crate::profile::{GiftProfile, Recipient};
use crate::retail::Product;

const FALLBACK_REASON: &str = "Matches the recipient's interests and budget.";

const SYSTEM_PROMPT: &str = "You are a thoughtful gift curator. From a numbered list of \
products, pick the best gifts for the recipient described. Prefer variety over several \
near-identical items, and respect the things to avoid.\n\n\
Respond with ONLY a JSON array, best first, of objects with:\n\
- \"index\": the product number from the list\n\
- \"reason\": one sentence on why this suits the recipient";

/// A shortlisted product with the curator's reasoning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CuratedGift {
    pub product: Product,
    pub reason: String,
    /// 1-based position in the shortlist.
    pub rank: u32,
}

#[derive(Debug)]
struct Pick {
    index: usize,
    reason: String,
}

impl Pick {
    /// Read one entry of the curator's array; entries without a usable
    /// non-negative integer `index` give `None`.
    fn from_value(value: &serde_json::Value) -> Option<Self> {
        let index = value.get("index")?.as_u64()?;
        Some(Self {
            index: usize::try_from(index).ok()?,
            reason: value
                .get("reason")
                .and_then(|r| r.as_str())
                .unwrap_or_default()
                .to_string(),
        })
    }
}

/// Picks from the curator's reply. A malformed entry is skipped without
/// discarding the rest of the array.
fn parse_picks(content: &str) -> Vec<Pick> {
    let entries = match serde_json::from_str::<Vec<serde_json::Value>>(&extract_json_array(content)) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(error = %e, "Unparseable curation output");
            return Vec::new();
        }
    };
    let total = entries.len();
    let picks: Vec<Pick> = entries.iter().filter_map(Pick::from_value).collect();
    if picks.len() < total {
        warn!(skipped = total - picks.len(), "Ignoring malformed curation picks");
    }
    picks
}

pub struct Curator {
    llm: Arc<dyn LlmProvider>,
    shortlist_size: usize,
    max_per_retailer: usize,
}

impl Curator {
    pub fn new(llm: Arc<dyn LlmProvider>, shortlist_size: usize, max_per_retailer: usize) -> Self {
        Self {
            llm,
            shortlist_size: shortlist_size.max(1),
            max_per_retailer: max_per_retailer.max(1),
        }
    }

    pub async fn curate(
        &self,
        recipient: &Recipient,
        profile: &GiftProfile,
        candidates: &[Product],
    ) -> Vec<CuratedGift> {
        if candidates.is_empty() {
            return Vec::new();
        }

        let request = CompletionRequest::new(vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(build_prompt(recipient, profile, candidates, self.shortlist_size)),
        ])
        .with_temperature(0.2)
        .with_max_tokens(1536);

        let picks = match self.llm.complete(request).await {
            Ok(response) => parse_picks(&response.content),
            Err(e) => {
                warn!(error = %e, "Curation call failed");
                Vec::new()
            }
        };

        let shortlist = self.apply_picks(candidates, picks);
        if !shortlist.is_empty() {
            info!(picked = shortlist.len(), candidates = candidates.len(), "Shortlist curated");
            return shortlist;
        }

        warn!(candidates = candidates.len(), "No usable picks, falling back to round-robin");
        self.round_robin(candidates)
    }

    /// Validate picks against the candidate list and enforce retailer diversity.
    fn apply_picks(&self, candidates: &[Product], picks: Vec<Pick>) -> Vec<CuratedGift> {
        let mut used: HashSet<usize> = HashSet::new();
        let mut per_retailer: HashMap<&str, usize> = HashMap::new();
        let mut shortlist = Vec::new();

        for pick in picks {
            if shortlist.len() >= self.shortlist_size {
                break;
            }
            // Prompt numbers products from 1.
            let Some(product) = pick.index.checked_sub(1).and_then(|i| candidates.get(i)) else {
                warn!(index = pick.index, "Curator picked a product outside the list");
                continue;
            };
            if !used.insert(pick.index) {
                continue;
            }
            let count = per_retailer.entry(product.retailer.as_str()).or_default();
            if *count >= self.max_per_retailer {
                continue;
            }
            *count += 1;

            let reason = pick.reason.trim();
            shortlist.push(CuratedGift {
                product: product.clone(),
                reason: if reason.is_empty() {
                    FALLBACK_REASON.to_string()
                } else {
                    reason.to_string()
                },
                rank: shortlist.len() as u32 + 1,
            });
        }
        shortlist
    }

    /// Candidates in order, alternating retailers.
    fn round_robin(&self, candidates: &[Product]) -> Vec<CuratedGift> {
        let mut order: Vec<&str> = Vec::new();
        let mut buckets: HashMap<&str, Vec<&Product>> = HashMap::new();
        for product in candidates {
            let key = product.retailer.as_str();
            if !buckets.contains_key(key) {
                order.push(key);
            }
            buckets.entry(key).or_default().push(product);
        }

        let mut shortlist = Vec::new();
        for round in 0..self.max_per_retailer {
            for retailer in &order {
                if shortlist.len() >= self.shortlist_size {
                    return shortlist;
                }
                if let Some(product) = buckets.get(retailer).and_then(|b| b.get(round)) {
                    shortlist.push(CuratedGift {
                        product: (*product).clone(),
                        reason: FALLBACK_REASON.to_string(),
                        rank: shortlist.len() as u32 + 1,
                    });
                }
            }
        }
        shortlist
    }
}

fn build_prompt(
    recipient: &Recipient,
    profile: &GiftProfile,
    candidates: &[Product],
    shortlist_size: usize,
) -> String {
    let mut prompt = String::new();
    let _ = writeln!(prompt, "Recipient: {}", recipient.name);
    if let Some(occasion) = &recipient.occasion {
        let _ = writeln!(prompt, "Occasion: {occasion}");
    }
    let _ = writeln!(prompt, "Profile: {}", profile.summary);
    if !profile.interests.is_empty() {
        let _ = writeln!(prompt, "Interests: {}", profile.interests.join(", "));
    }
    if let Some(aesthetic) = &profile.aesthetic {
        let _ = writeln!(prompt, "Aesthetic: {aesthetic}");
    }
    if !profile.avoid.is_empty() {
        let _ = writeln!(prompt, "Avoid: {}", profile.avoid.join(", "));
    }
    let _ = writeln!(prompt, "\nPick up to {shortlist_size} products:");
    for (i, product) in candidates.iter().enumerate() {
        let _ = writeln!(
            prompt,
            "{}. {} | {} {} | {}",
            i + 1,
            product.title,
            product.price,
            product.currency,
            product.retailer
        );
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use crate::error::LlmError;
    use crate::llm::{CompletionResponse, FinishReason};

    struct FixedLlm(Option<String>);

    #[async_trait]
    impl LlmProvider for FixedLlm {
        fn model_name(&self) -> &str {
            "fixed"
        }

        fn cost_per_token(&self) -> (Decimal, Decimal) {
            (Decimal::ZERO, Decimal::ZERO)
        }

        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            match &self.0 {
                Some(content) => Ok(CompletionResponse {
                    content: content.clone(),
                    input_tokens: 0,
                    output_tokens: 0,
                    finish_reason: FinishReason::Stop,
                    response_id: None,
                }),
                None => Err(LlmError::RequestFailed {
                    provider: "fixed".into(),
                    reason: "down".into(),
                }),
            }
        }
    }

    fn product(retailer: &str, id: usize) -> Product {
        Product {
            retailer: retailer.into(),
            external_id: id.to_string(),
            title: format!("{retailer} item {id}"),
            price: dec!(25),
            currency: "USD".into(),
            url: format!("https://{retailer}.example/{id}"),
            image_url: None,
            rating: None,
        }
    }

    fn candidates() -> Vec<Product> {
        vec![
            product("etsy", 1),
            product("etsy", 2),
            product("etsy", 3),
            product("ebay", 4),
            product("amazon", 5),
        ]
    }

    fn curator(response: Option<&str>, size: usize, per_retailer: usize) -> Curator {
        Curator::new(Arc::new(FixedLlm(response.map(String::from))), size, per_retailer)
    }

    fn recipient() -> Recipient {
        Recipient {
            name: "Ana".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn follows_valid_picks_in_order() {
        let c = curator(
            Some(r#"[{"index": 5, "reason": "great tumbler"}, {"index": 1, "reason": "handmade"}]"#),
            8,
            4,
        );
        let shortlist = c.curate(&recipient(), &GiftProfile::default(), &candidates()).await;
        assert_eq!(shortlist.len(), 2);
        assert_eq!(shortlist[0].product.external_id, "5");
        assert_eq!(shortlist[0].rank, 1);
        assert_eq!(shortlist[1].reason, "handmade");
        assert_eq!(shortlist[1].rank, 2);
    }

    #[tokio::test]
    async fn drops_out_of_range_and_duplicates() {
        let c = curator(
            Some(r#"[{"index": 0}, {"index": 99}, {"index": 2}, {"index": 2}]"#),
            8,
            4,
        );
        let shortlist = c.curate(&recipient(), &GiftProfile::default(), &candidates()).await;
        assert_eq!(shortlist.len(), 1);
        assert_eq!(shortlist[0].product.external_id, "2");
        assert_eq!(shortlist[0].reason, FALLBACK_REASON);
    }

    #[tokio::test]
    async fn malformed_entries_do_not_discard_valid_picks() {
        let c = curator(
            Some(
                r#"[{"index": 3, "reason": "best"}, {"index": -1}, {"index": "2"},
                    {"index": 1.5}, {"reason": "no index"}, "4"]"#,
            ),
            8,
            4,
        );
        let shortlist = c.curate(&recipient(), &GiftProfile::default(), &candidates()).await;
        let picked: Vec<_> = shortlist
            .iter()
            .map(|g| (g.product.external_id.as_str(), g.reason.as_str()))
            .collect();
        assert_eq!(picked, vec![("3", "best")]);
    }

    #[test]
    fn non_array_reply_yields_no_picks() {
        assert!(parse_picks("I could not decide, sorry.").is_empty());
        assert_eq!(parse_picks(r#"[{"index": 2}]"#)[0].index, 2);
    }

    #[tokio::test]
    async fn enforces_retailer_diversity() {
        let c = curator(
            Some(r#"[{"index": 1}, {"index": 2}, {"index": 3}, {"index": 4}]"#),
            8,
            2,
        );
        let shortlist = c.curate(&recipient(), &GiftProfile::default(), &candidates()).await;
        let ids: Vec<_> = shortlist.iter().map(|g| g.product.external_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "4"]);
    }

    #[tokio::test]
    async fn llm_failure_round_robins() {
        let c = curator(None, 4, 4);
        let shortlist = c.curate(&recipient(), &GiftProfile::default(), &candidates()).await;
        let ids: Vec<_> = shortlist.iter().map(|g| g.product.external_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "4", "5", "2"]);
        assert_eq!(shortlist.last().unwrap().rank, 4);
    }

    #[tokio::test]
    async fn empty_candidates_short_circuit() {
        let c = curator(Some("[]"), 4, 4);
        assert!(c.curate(&recipient(), &GiftProfile::default(), &[]).await.is_empty());
    }

    #[test]
    fn prompt_numbers_from_one() {
        let prompt = build_prompt(&recipient(), &GiftProfile::default(), &candidates(), 3);
        assert!(prompt.contains("1. etsy item 1 | 25 USD | etsy"));
        assert!(prompt.contains("5. amazon item 5"));
        assert!(prompt.contains("Pick up to 3 products"));
    }
}
