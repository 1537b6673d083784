//! Tools and groups shipped with the client

use super::{ToolDescriptor, ToolGroup};

/// Built-in tool catalog, in picker order
pub fn builtin_tools() -> Vec<ToolDescriptor> {
    [
        ("google_search", "Search", "search", "Search the web", "Search"),
        ("news_search", "News", "news", "Latest news", "Newspaper"),
        ("stock_price", "Stocks", "finance", "Stock data", "TrendingUp"),
        ("wikipedia_fetch", "Wikipedia", "information", "Encyclopedia", "BookOpen"),
        ("youtube_search", "YouTube", "media", "Find videos", "Play"),
        ("youtube_transcribe", "Transcript", "media", "Video text", "FileText"),
        ("html_skim", "Web", "web", "Read pages", "Globe"),
        ("weather_forecast", "Weather", "weather", "Forecasts", "Cloud"),
        ("pubmed_search", "PubMed", "medical", "Medical research", "Heart"),
        (
            "openstreetmap_search",
            "Maps",
            "location",
            "Find locations and addresses",
            "Map",
        ),
        (
            "github_search",
            "GitHub",
            "development",
            "Search code repositories",
            "Github",
        ),
        (
            "country_info",
            "Countries",
            "location",
            "Country data and statistics",
            "Flag",
        ),
        (
            "timezone_api",
            "Timezone",
            "location",
            "World timezone information",
            "Clock",
        ),
    ]
    .into_iter()
    .map(|(identifier, display, category, description, icon)| {
        ToolDescriptor::new(identifier, display, category, description).with_icon(icon)
    })
    .collect()
}

/// Built-in quick groups
pub fn builtin_groups() -> Vec<ToolGroup> {
    vec![
        ToolGroup::new(
            "Research & Facts",
            ["google_search", "wikipedia_fetch", "pubmed_search"],
            "Comprehensive information gathering",
        )
        .with_icon("Search"),
        ToolGroup::new(
            "News & Updates",
            ["news_search", "google_search"],
            "Latest news and current events",
        )
        .with_icon("Newspaper"),
        ToolGroup::new(
            "Verify News",
            ["news_search", "google_search", "html_skim"],
            "Cross-check and verify stories",
        )
        .with_icon("ShieldCheck"),
        ToolGroup::new(
            "Video Analysis",
            ["youtube_search", "youtube_transcribe"],
            "Find and analyze video content",
        )
        .with_icon("Play"),
        ToolGroup::new(
            "Market Data",
            ["stock_price", "news_search"],
            "Financial information and analysis",
        )
        .with_icon("TrendingUp"),
        ToolGroup::new(
            "Location & Maps",
            ["openstreetmap_search", "timezone_api", "country_info"],
            "Geographic and location services",
        )
        .with_icon("MapPin"),
        ToolGroup::new(
            "Development Tools",
            ["github_search", "html_skim"],
            "Code search and web development",
        )
        .with_icon("Code"),
    ]
}
