//! Built-in destination, search-engine, and query catalogs.
//!
//! The catalog is plain configuration data: the engine treats its contents
//! as opaque and callers may inject a replacement via
//! [`crate::config::EngineConfig::with_catalog`]. The built-in set leans on
//! widely known, high-traffic destinations so decoy visits blend in.

/// A browsable destination tagged with a category id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub url: String,
    pub category: String,
}

/// A search engine with a `{query}` URL template and a built-in default
/// weight used when the user has not overridden it.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchEngine {
    pub id: String,
    pub name: String,
    pub url_template: String,
    pub default_weight: f64,
}

/// The full catalog the task generator draws from.
#[derive(Debug, Clone)]
pub struct Catalog {
    pub destinations: Vec<Destination>,
    pub search_engines: Vec<SearchEngine>,
    pub ad_destinations: Vec<String>,
    pub queries: Vec<String>,
}

// (url, category)
const DESTINATIONS: &[(&str, &str)] = &[
    ("https://www.wikipedia.org", "reference"),
    ("https://www.britannica.com", "reference"),
    ("https://archive.org", "reference"),
    ("https://www.reuters.com", "news"),
    ("https://apnews.com", "news"),
    ("https://www.bbc.com/news", "news"),
    ("https://www.theguardian.com", "news"),
    ("https://news.ycombinator.com", "tech"),
    ("https://arstechnica.com", "tech"),
    ("https://www.theverge.com", "tech"),
    ("https://stackoverflow.com", "tech"),
    ("https://github.com/trending", "tech"),
    ("https://www.amazon.com", "shopping"),
    ("https://www.ebay.com", "shopping"),
    ("https://www.etsy.com", "shopping"),
    ("https://www.walmart.com", "shopping"),
    ("https://www.reddit.com", "social"),
    ("https://www.pinterest.com", "social"),
    ("https://www.quora.com", "social"),
    ("https://www.imdb.com", "entertainment"),
    ("https://www.rottentomatoes.com", "entertainment"),
    ("https://www.goodreads.com", "entertainment"),
    ("https://www.espn.com", "sports"),
    ("https://www.skysports.com", "sports"),
    ("https://www.booking.com", "travel"),
    ("https://www.tripadvisor.com", "travel"),
    ("https://www.lonelyplanet.com", "travel"),
    ("https://www.investopedia.com", "finance"),
    ("https://finance.yahoo.com", "finance"),
    ("https://www.healthline.com", "health"),
    ("https://www.webmd.com", "health"),
    ("https://www.allrecipes.com", "lifestyle"),
    ("https://www.epicurious.com", "lifestyle"),
];

// (id, name, url template, default weight)
const SEARCH_ENGINES: &[(&str, &str, &str, f64)] = &[
    (
        "google",
        "Google",
        "https://www.google.com/search?q={query}",
        40.0,
    ),
    ("bing", "Bing", "https://www.bing.com/search?q={query}", 25.0),
    (
        "duckduckgo",
        "DuckDuckGo",
        "https://duckduckgo.com/?q={query}",
        20.0,
    ),
    (
        "brave",
        "Brave Search",
        "https://search.brave.com/search?q={query}",
        10.0,
    ),
    (
        "startpage",
        "Startpage",
        "https://www.startpage.com/sp/search?query={query}",
        5.0,
    ),
];

// Ad-heavy destinations for adClick tasks.
const AD_DESTINATIONS: &[&str] = &[
    "https://www.buzzfeed.com",
    "https://www.dailymail.co.uk",
    "https://www.tmz.com",
    "https://www.cnet.com/deals",
    "https://www.retailmenot.com",
    "https://slickdeals.net",
    "https://www.coupons.com",
    "https://www.banggood.com",
    "https://www.wish.com",
    "https://www.aliexpress.com",
    "https://www.temu.com",
    "https://www.groupon.com",
];

const QUERIES: &[&str] = &[
    "weather forecast this week",
    "best laptops 2025",
    "easy dinner recipes",
    "how to learn a new language",
    "current mortgage rates",
    "top rated wireless headphones",
    "local farmers market hours",
    "flight deals to europe",
    "beginner yoga routine",
    "how to start a vegetable garden",
    "electric car comparison",
    "best books this year",
    "home workout without equipment",
    "how does compound interest work",
    "hiking trails near me",
    "smartphone camera comparison",
    "diy home office setup",
    "slow cooker meal ideas",
    "how to improve sleep quality",
    "upcoming movie releases",
    "best budget travel destinations",
    "standing desk benefits",
    "how to make sourdough bread",
    "museum exhibits this month",
    "running shoes for beginners",
    "meal prep for the week",
    "password manager comparison",
    "indoor plants low light",
    "tax filing deadline",
    "coffee brewing methods",
    "weekend getaway ideas",
    "how to tie a tie",
    "puppy training tips",
    "resume writing tips",
    "keyboard shortcuts productivity",
    "stretching exercises for back pain",
    "photography basics for beginners",
    "home insurance explained",
    "air fryer recipes",
    "learn to play guitar online",
];

impl Catalog {
    /// Compiled-in catalog used when no replacement is injected.
    pub fn builtin() -> Self {
        Self {
            destinations: DESTINATIONS
                .iter()
                .map(|(url, category)| Destination {
                    url: (*url).to_string(),
                    category: (*category).to_string(),
                })
                .collect(),
            search_engines: SEARCH_ENGINES
                .iter()
                .map(|(id, name, template, weight)| SearchEngine {
                    id: (*id).to_string(),
                    name: (*name).to_string(),
                    url_template: (*template).to_string(),
                    default_weight: *weight,
                })
                .collect(),
            ad_destinations: AD_DESTINATIONS.iter().map(|s| (*s).to_string()).collect(),
            queries: QUERIES.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    /// Distinct category ids in catalog order.
    pub fn category_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        for dest in &self.destinations {
            if !ids.contains(&dest.category) {
                ids.push(dest.category.clone());
            }
        }
        ids
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}
