//! Gift profile inference: one curation pass over scraped content.

use std::fmt::Write as _;
use std::sync::Arc;

use tracing::{info, warn};

use super::{GiftProfile, Recipient};
use crate::enrichment::Enrichment;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider, extract_json_object};
use crate::scrape::ScrapedProfile;

const POSTS_PER_PROFILE: usize = 15;
const POST_CHARS: usize = 280;
const FALLBACK_INTERESTS: usize = 5;

const SYSTEM_PROMPT: &str = "You build gift profiles. Read the social media content and \
context about a gift recipient and describe what they would enjoy receiving.\n\n\
Respond with ONLY a JSON object with these fields:\n\
- \"summary\": one or two sentences about the person\n\
- \"interests\": array of short interest labels\n\
- \"aesthetic\": their visual/style taste, or null\n\
- \"lifestyle\": a short lifestyle description, or null\n\
- \"gift_ideas\": array of 3-6 concrete product search queries\n\
- \"avoid\": array of things not to buy them";

pub struct ProfileInferer {
    llm: Arc<dyn LlmProvider>,
}

impl ProfileInferer {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Infer a gift profile. Never fails: LLM or parse errors fall back to
    /// a profile built from the enrichment alone.
    pub async fn infer(
        &self,
        recipient: &Recipient,
        scraped: &[ScrapedProfile],
        enrichment: &Enrichment,
    ) -> GiftProfile {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(build_prompt(recipient, scraped, enrichment)),
        ])
        .with_temperature(0.4)
        .with_max_tokens(1024);

        let response = match self.llm.complete(request).await {
            Ok(r) => r,
            Err(e) => {
                warn!(recipient = %recipient.name, error = %e, "Profile inference call failed, using enrichment fallback");
                return fallback_profile(recipient, enrichment);
            }
        };

        match serde_json::from_str::<GiftProfile>(&extract_json_object(&response.content)) {
            Ok(mut profile) => {
                profile.normalize();
                if profile.gift_ideas.is_empty() {
                    warn!(recipient = %recipient.name, "Inferred profile had no interests or ideas, using fallback");
                    return fallback_profile(recipient, enrichment);
                }
                info!(
                    recipient = %recipient.name,
                    interests = profile.interests.len(),
                    ideas = profile.gift_ideas.len(),
                    cost_usd = %self.llm.estimate_cost(&response),
                    "Gift profile inferred"
                );
                profile
            }
            Err(e) => {
                warn!(recipient = %recipient.name, error = %e, "Unparseable gift profile, using enrichment fallback");
                fallback_profile(recipient, enrichment)
            }
        }
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max).collect();
        out.push('…');
        out
    }
}

pub(crate) fn build_prompt(
    recipient: &Recipient,
    scraped: &[ScrapedProfile],
    enrichment: &Enrichment,
) -> String {
    let mut prompt = String::new();
    let _ = writeln!(prompt, "Recipient: {}", recipient.name);
    if let Some(rel) = &recipient.relationship {
        let _ = writeln!(prompt, "Relationship: {rel}");
    }
    if let Some(occasion) = &recipient.occasion {
        let _ = writeln!(prompt, "Occasion: {occasion}");
    }
    if let Some(desc) = &recipient.description {
        let _ = writeln!(prompt, "Notes from the gift giver: {desc}");
    }

    for profile in scraped {
        let _ = writeln!(prompt, "\n## {} @{}", profile.platform, profile.handle);
        if let Some(bio) = &profile.bio {
            let _ = writeln!(prompt, "Bio: {bio}");
        }
        for post in profile.posts.iter().take(POSTS_PER_PROFILE) {
            let _ = writeln!(prompt, "- {}", truncate(&post.text, POST_CHARS));
        }
    }

    if !enrichment.interests.is_empty() {
        let cats: Vec<String> = enrichment
            .interests
            .iter()
            .map(|i| format!("{} ({})", i.category, i.score))
            .collect();
        let _ = writeln!(prompt, "\nDetected interest categories: {}", cats.join(", "));
    }
    if !enrichment.brands.is_empty() {
        let _ = writeln!(prompt, "Brands mentioned: {}", enrichment.brands.join(", "));
    }
    if !enrichment.top_hashtags.is_empty() {
        let _ = writeln!(prompt, "Frequent hashtags: {}", enrichment.top_hashtags.join(", "));
    }
    prompt
}

/// Profile built purely from keyword enrichment.
pub fn fallback_profile(recipient: &Recipient, enrichment: &Enrichment) -> GiftProfile {
    let interests: Vec<String> = enrichment
        .interests
        .iter()
        .take(FALLBACK_INTERESTS)
        .map(|i| i.category.clone())
        .collect();
    let mut gift_ideas = enrichment.search_hints(FALLBACK_INTERESTS);
    gift_ideas.extend(enrichment.brands.iter().take(2).map(|b| format!("{b} gift")));
    if gift_ideas.is_empty() {
        gift_ideas.push(match &recipient.occasion {
            Some(occasion) => format!("{occasion} gift"),
            None => "unique gift".to_string(),
        });
    }

    let summary = if interests.is_empty() {
        format!("Not much is known about {} yet.", recipient.name)
    } else {
        format!("{} seems to be into {}.", recipient.name, interests.join(", "))
    };

    let mut profile = GiftProfile {
        summary,
        interests,
        aesthetic: None,
        lifestyle: None,
        gift_ideas,
        avoid: Vec::new(),
    };
    profile.normalize();
    profile
}
