//! Static keyword tables for the enrichment engine.

/// An interest category and the lowercase keywords that signal it.
pub struct Category {
    pub name: &'static str,
    pub keywords: &'static [&'static str],
    /// Seed search query used when the LLM gives us nothing better.
    pub search_hint: &'static str,
}

pub static CATEGORIES: &[Category] = &[
    Category {
        name: "outdoors",
        keywords: &["hiking", "hike", "trail", "camping", "summit", "backpacking", "mountain", "climbing", "kayak"],
        search_hint: "outdoor adventure gear",
    },
    Category {
        name: "fitness",
        keywords: &["gym", "workout", "crossfit", "yoga", "pilates", "marathon", "running", "5k", "lifting"],
        search_hint: "fitness accessories",
    },
    Category {
        name: "cooking",
        keywords: &["recipe", "cooking", "baking", "sourdough", "kitchen", "chef", "homemade", "bread", "pasta"],
        search_hint: "gourmet kitchen tools",
    },
    Category {
        name: "coffee",
        keywords: &["coffee", "espresso", "latte", "pour-over", "pourover", "barista", "cold brew"],
        search_hint: "specialty coffee gift",
    },
    Category {
        name: "travel",
        keywords: &["travel", "wanderlust", "passport", "airport", "roadtrip", "road trip", "vacation", "abroad"],
        search_hint: "travel accessories",
    },
    Category {
        name: "gaming",
        keywords: &["gaming", "gamer", "playstation", "xbox", "nintendo", "steam", "twitch", "esports"],
        search_hint: "gaming accessories",
    },
    Category {
        name: "music",
        keywords: &["concert", "vinyl", "guitar", "spotify", "playlist", "festival", "band", "piano"],
        search_hint: "music lover gift",
    },
    Category {
        name: "reading",
        keywords: &["book", "reading", "novel", "bookstagram", "booktok", "library", "kindle"],
        search_hint: "book lover gift",
    },
    Category {
        name: "art",
        keywords: &["painting", "drawing", "sketch", "watercolor", "illustration", "ceramics", "pottery", "artist"],
        search_hint: "art supplies set",
    },
    Category {
        name: "photography",
        keywords: &["photography", "35mm", "film camera", "lens", "shotoniphone", "photographer"],
        search_hint: "photography accessories",
    },
    Category {
        name: "fashion",
        keywords: &["ootd", "outfit", "fashion", "streetwear", "thrift", "style", "sneakers"],
        search_hint: "fashion accessories",
    },
    Category {
        name: "beauty",
        keywords: &["skincare", "makeup", "grwm", "beauty", "nails", "serum", "fragrance"],
        search_hint: "skincare gift set",
    },
    Category {
        name: "pets",
        keywords: &["dog", "puppy", "cat", "kitten", "pet", "rescue"],
        search_hint: "pet lover gift",
    },
    Category {
        name: "gardening",
        keywords: &["garden", "gardening", "plants", "plantmom", "houseplant", "succulent", "tomatoes"],
        search_hint: "gardening gift",
    },
    Category {
        name: "tech",
        keywords: &["tech", "coding", "programmer", "gadget", "setup", "keyboard", "developer"],
        search_hint: "desk gadget",
    },
    Category {
        name: "home",
        keywords: &["decor", "interior", "cozy", "candle", "homedecor", "apartment"],
        search_hint: "cozy home decor",
    },
    Category {
        name: "wine & cocktails",
        keywords: &["wine", "cocktail", "mixology", "whiskey", "bourbon", "sommelier"],
        search_hint: "cocktail kit",
    },
    Category {
        name: "sports fan",
        keywords: &["nba", "nfl", "soccer", "football", "baseball", "hockey", "game day", "gameday"],
        search_hint: "sports fan gift",
    },
];

/// Brand names reported as mentions. Lowercase match, display-case output.
pub static BRANDS: &[&str] = &[
    "Patagonia", "Nike", "Adidas", "Lululemon", "Apple", "Sony", "Nintendo", "Lego", "Le Creuset",
    "Yeti", "Stanley", "Starbucks", "Sephora", "Glossier", "Arc'teryx", "The North Face", "Canon",
    "Fujifilm", "Kindle", "Dyson",
];
