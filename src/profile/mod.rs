//! Gift profile: the inferred picture of a recipient that drives search.

pub mod inference;

pub use inference::ProfileInferer;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Who the gift is for. Built from a recommendation session.
#[derive(Debug, Clone, Default)]
pub struct Recipient {
    pub name: String,
    pub relationship: Option<String>,
    pub occasion: Option<String>,
    pub budget_min: Option<Decimal>,
    pub budget_max: Option<Decimal>,
    pub description: Option<String>,
}

/// Inferred interests of a recipient, stored as JSON on the session row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GiftProfile {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub aesthetic: Option<String>,
    #[serde(default)]
    pub lifestyle: Option<String>,
    /// Retailer search queries.
    #[serde(default)]
    pub gift_ideas: Vec<String>,
    #[serde(default)]
    pub avoid: Vec<String>,
}

impl GiftProfile {
    /// Trim, drop blanks, and dedupe (case-insensitive) every list field.
    pub fn normalize(&mut self) {
        for list in [&mut self.interests, &mut self.gift_ideas, &mut self.avoid] {
            let mut seen = std::collections::HashSet::new();
            list.retain_mut(|item| {
                *item = item.trim().to_string();
                !item.is_empty() && seen.insert(item.to_lowercase())
            });
        }
        if self.gift_ideas.is_empty() {
            self.gift_ideas = self.interests.iter().map(|i| format!("{i} gift")).collect();
        }
    }
}
