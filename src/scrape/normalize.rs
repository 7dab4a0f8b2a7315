//! Map raw actor dataset items into a [`ScrapedProfile`].
//!
//! Actor output shapes drift between versions, so everything here reads
//! `serde_json::Value` leniently and skips fields it does not recognize.

use serde_json::Value;

use super::{Platform, ScrapedPost, ScrapedProfile};

/// Normalize dataset items for `platform`. Returns `None` when nothing usable came back.
pub fn normalize_items(
    platform: Platform,
    handle: &str,
    items: &[Value],
    max_posts: usize,
) -> Option<ScrapedProfile> {
    let mut profile = match platform {
        Platform::Instagram => normalize_instagram(handle, items),
        Platform::Tiktok => normalize_tiktok(handle, items),
        Platform::Twitter => normalize_twitter(handle, items),
    };
    profile.posts.retain(|p| !p.text.trim().is_empty() || !p.hashtags.is_empty());
    profile.posts.truncate(max_posts);

    if profile.is_empty() { None } else { Some(profile) }
}

fn empty_profile(platform: Platform, handle: &str) -> ScrapedProfile {
    ScrapedProfile {
        platform,
        handle: handle.to_string(),
        display_name: None,
        bio: None,
        followers: None,
        posts: Vec::new(),
    }
}

fn str_field(v: &Value, key: &str) -> Option<String> {
    v.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn u64_field(v: &Value, key: &str) -> Option<u64> {
    v.get(key).and_then(Value::as_u64)
}

/// Hashtags arrive either as `["tag"]` or `[{"name": "tag"}]`.
fn hashtags(v: &Value, key: &str) -> Vec<String> {
    v.get(key)
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(|t| match t {
                    Value::String(s) => Some(s.clone()),
                    Value::Object(_) => str_field(t, "name"),
                    _ => None,
                })
                .map(|t| t.trim_start_matches('#').to_lowercase())
                .filter(|t| !t.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// `apify/instagram-profile-scraper`: one item per profile with `latestPosts`.
fn normalize_instagram(handle: &str, items: &[Value]) -> ScrapedProfile {
    let mut profile = empty_profile(Platform::Instagram, handle);
    for item in items {
        profile.display_name = profile.display_name.or_else(|| str_field(item, "fullName"));
        profile.bio = profile.bio.or_else(|| str_field(item, "biography"));
        profile.followers = profile.followers.or_else(|| u64_field(item, "followersCount"));

        let posts = item.get("latestPosts").and_then(Value::as_array);
        for post in posts.into_iter().flatten() {
            profile.posts.push(ScrapedPost {
                text: str_field(post, "caption").unwrap_or_default(),
                hashtags: hashtags(post, "hashtags"),
                likes: u64_field(post, "likesCount"),
            });
        }
    }
    profile
}

/// `clockworks/tiktok-scraper`: one item per video with `authorMeta`.
fn normalize_tiktok(handle: &str, items: &[Value]) -> ScrapedProfile {
    let mut profile = empty_profile(Platform::Tiktok, handle);
    for item in items {
        if let Some(author) = item.get("authorMeta") {
            profile.display_name = profile.display_name.or_else(|| str_field(author, "nickName"));
            profile.bio = profile.bio.or_else(|| str_field(author, "signature"));
            profile.followers = profile.followers.or_else(|| u64_field(author, "fans"));
        }
        profile.posts.push(ScrapedPost {
            text: str_field(item, "text").unwrap_or_default(),
            hashtags: hashtags(item, "hashtags"),
            likes: u64_field(item, "diggCount"),
        });
    }
    profile
}

/// `apidojo/tweet-scraper`: one item per tweet with `author`.
fn normalize_twitter(handle: &str, items: &[Value]) -> ScrapedProfile {
    let mut profile = empty_profile(Platform::Twitter, handle);
    for item in items {
        if let Some(author) = item.get("author") {
            profile.display_name = profile.display_name.or_else(|| str_field(author, "name"));
            profile.bio = profile.bio.or_else(|| str_field(author, "description"));
            profile.followers = profile.followers.or_else(|| u64_field(author, "followers"));
        }
        let tags = item
            .get("entities")
            .map(hashtags_from_entities)
            .unwrap_or_default();
        profile.posts.push(ScrapedPost {
            text: str_field(item, "text")
                .or_else(|| str_field(item, "fullText"))
                .unwrap_or_default(),
            hashtags: tags,
            likes: u64_field(item, "likeCount"),
        });
    }
    profile
}

fn hashtags_from_entities(entities: &Value) -> Vec<String> {
    entities
        .get("hashtags")
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(|t| str_field(t, "text"))
                .map(|t| t.to_lowercase())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn instagram_profile_item() {
        let items = vec![json!({
            "username": "jane",
            "fullName": "Jane Doe",
            "biography": "Trail runner & coffee nerd",
            "followersCount": 1200,
            "latestPosts": [
                {"caption": "Sunrise summit #hiking", "hashtags": ["hiking"], "likesCount": 40},
                {"caption": "", "hashtags": []},
                {"caption": "Pour-over Sunday", "likesCount": 12}
            ]
        })];
        let profile = normalize_items(Platform::Instagram, "jane", &items, 10).unwrap();
        assert_eq!(profile.display_name.as_deref(), Some("Jane Doe"));
        assert_eq!(profile.followers, Some(1200));
        assert_eq!(profile.posts.len(), 2);
        assert_eq!(profile.posts[0].hashtags, vec!["hiking"]);
    }

    #[test]
    fn tiktok_items_with_object_hashtags() {
        let items = vec![
            json!({
                "text": "new board day",
                "hashtags": [{"name": "Skateboarding"}],
                "diggCount": 500,
                "authorMeta": {"nickName": "Sk8r", "signature": "skate or die", "fans": 90}
            }),
            json!({"text": "kickflip attempt 40", "hashtags": []}),
        ];
        let profile = normalize_items(Platform::Tiktok, "sk8r", &items, 10).unwrap();
        assert_eq!(profile.bio.as_deref(), Some("skate or die"));
        assert_eq!(profile.posts[0].hashtags, vec!["skateboarding"]);
        assert_eq!(profile.posts.len(), 2);
    }

    #[test]
    fn twitter_items() {
        let items = vec![json!({
            "text": "Finished another sourdough loaf",
            "likeCount": 3,
            "entities": {"hashtags": [{"text": "Baking"}]},
            "author": {"name": "Bob", "description": "home baker", "followers": 10}
        })];
        let profile = normalize_items(Platform::Twitter, "bob", &items, 10).unwrap();
        assert_eq!(profile.posts[0].hashtags, vec!["baking"]);
        assert_eq!(profile.followers, Some(10));
    }

    #[test]
    fn post_cap_applies() {
        let items: Vec<Value> = (0..20).map(|i| json!({"text": format!("post {i}")})).collect();
        let profile = normalize_items(Platform::Twitter, "bob", &items, 5).unwrap();
        assert_eq!(profile.posts.len(), 5);
    }

    #[test]
    fn empty_dataset_is_none() {
        assert!(normalize_items(Platform::Instagram, "ghost", &[], 10).is_none());
        let items = vec![json!({"username": "ghost", "latestPosts": []})];
        assert!(normalize_items(Platform::Instagram, "ghost", &items, 10).is_none());
    }
}
