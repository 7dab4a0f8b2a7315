//! Social-profile scraping.
//!
//! A scrape is a third-party job: start an actor run, poll it to
//! completion, read its dataset. Results are normalized into
//! [`ScrapedProfile`] regardless of platform.

pub mod apify;
pub mod normalize;
pub mod status;

pub use apify::ApifyScraper;
pub use status::scrape_social_profile;

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ScrapeError;

static HANDLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._]{1,30}$").expect("valid handle regex"));

/// Supported social platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Instagram,
    Tiktok,
    Twitter,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Instagram => "instagram",
            Platform::Tiktok => "tiktok",
            Platform::Twitter => "twitter",
        }
    }

    /// Hosts whose profile URLs we accept in place of a bare handle.
    fn hosts(&self) -> &'static [&'static str] {
        match self {
            Platform::Instagram => &["instagram.com"],
            Platform::Tiktok => &["tiktok.com"],
            Platform::Twitter => &["twitter.com", "x.com"],
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = ScrapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "instagram" | "ig" => Ok(Platform::Instagram),
            "tiktok" => Ok(Platform::Tiktok),
            "twitter" | "x" => Ok(Platform::Twitter),
            other => Err(ScrapeError::UnsupportedPlatform(other.to_string())),
        }
    }
}

/// First path segment of a profile URL on one of the platform's hosts.
/// Input that does not start with such a host (after an optional scheme and
/// `www.` or `m.`) is not a URL and gives `None`.
fn profile_url_segment(platform: Platform, input: &str) -> Option<&str> {
    let rest = input
        .strip_prefix("https://")
        .or_else(|| input.strip_prefix("http://"))
        .unwrap_or(input);
    let rest = rest
        .strip_prefix("www.")
        .or_else(|| rest.strip_prefix("m."))
        .unwrap_or(rest);

    platform.hosts().iter().find_map(|host| {
        let path = rest.strip_prefix(host)?;
        if !(path.is_empty() || path.starts_with(['/', '?', '#'])) {
            return None;
        }
        path.trim_start_matches('/').split(['/', '?', '#']).next()
    })
}

/// Turn user input (`@name`, `name`, or a profile URL) into a bare handle.
pub fn normalize_handle(platform: Platform, input: &str) -> Result<String, ScrapeError> {
    let trimmed = input.trim();
    let handle = profile_url_segment(platform, trimmed)
        .unwrap_or(trimmed)
        .trim_start_matches('@');
    if !HANDLE_RE.is_match(handle) {
        return Err(ScrapeError::InvalidHandle {
            handle: input.to_string(),
            reason: "expected 1-30 letters, digits, '.' or '_'".to_string(),
        });
    }
    Ok(handle.to_string())
}

/// One post/video/tweet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrapedPost {
    pub text: String,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub likes: Option<u64>,
}

/// Normalized scrape output, stored as JSON on the `social_profiles` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedProfile {
    pub platform: Platform,
    pub handle: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub followers: Option<u64>,
    #[serde(default)]
    pub posts: Vec<ScrapedPost>,
}

impl ScrapedProfile {
    pub fn is_empty(&self) -> bool {
        self.posts.is_empty() && self.bio.as_deref().is_none_or(|b| b.trim().is_empty())
    }
}

/// Something that can run a scrape job for a single handle.
///
/// `Ok(None)` means the job finished without usable data (failed run,
/// timeout, empty dataset). `Err` means we could not talk to the vendor.
#[async_trait]
pub trait Scraper: Send + Sync {
    async fn scrape(
        &self,
        platform: Platform,
        handle: &str,
    ) -> Result<Option<ScrapedProfile>, ScrapeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_parsing() {
        assert_eq!("Instagram".parse::<Platform>().unwrap(), Platform::Instagram);
        assert_eq!("x".parse::<Platform>().unwrap(), Platform::Twitter);
        assert_eq!(" TikTok ".parse::<Platform>().unwrap(), Platform::Tiktok);
        assert!(matches!(
            "myspace".parse::<Platform>(),
            Err(ScrapeError::UnsupportedPlatform(_))
        ));
    }

    #[test]
    fn handle_strips_at_sign() {
        assert_eq!(normalize_handle(Platform::Instagram, "@jane.doe").unwrap(), "jane.doe");
    }

    #[test]
    fn handle_from_profile_url() {
        assert_eq!(
            normalize_handle(Platform::Instagram, "https://www.instagram.com/jane_doe/?hl=en")
                .unwrap(),
            "jane_doe"
        );
        assert_eq!(
            normalize_handle(Platform::Twitter, "https://x.com/jack").unwrap(),
            "jack"
        );
        assert_eq!(
            normalize_handle(Platform::Tiktok, "tiktok.com/@dancer99").unwrap(),
            "dancer99"
        );
    }

    #[test]
    fn handle_that_only_contains_a_host_is_kept() {
        assert_eq!(
            normalize_handle(Platform::Instagram, "instagram.community").unwrap(),
            "instagram.community"
        );
        assert_eq!(normalize_handle(Platform::Twitter, "x.comedy").unwrap(), "x.comedy");
        assert_eq!(
            normalize_handle(Platform::Tiktok, "m.tiktok.com/@dancer99?lang=en").unwrap(),
            "dancer99"
        );
        assert!(normalize_handle(Platform::Instagram, "https://instagram.com/").is_err());
    }

    #[test]
    fn handle_rejects_garbage() {
        assert!(normalize_handle(Platform::Instagram, "").is_err());
        assert!(normalize_handle(Platform::Instagram, "has space").is_err());
        assert!(normalize_handle(Platform::Instagram, &"a".repeat(31)).is_err());
    }

    #[test]
    fn empty_profile_detection() {
        let mut profile = ScrapedProfile {
            platform: Platform::Instagram,
            handle: "x".into(),
            display_name: None,
            bio: Some("   ".into()),
            followers: None,
            posts: vec![],
        };
        assert!(profile.is_empty());
        profile.bio = Some("climber".into());
        assert!(!profile.is_empty());
    }
}
