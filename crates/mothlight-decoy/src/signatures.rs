//! Client-signature classification.
//!
//! The decoy front end decides what gets counted; the telemetry sink does
//! not. Classification is a case-insensitive scan of the User-Agent string
//! for well-known crawler markers.

/// Substrings identifying crawler/bot user agents. Kept lowercase; matching
/// lowercases the input.
const CRAWLER_MARKERS: &[&str] = &[
    "googlebot",
    "bingbot",
    "slurp",
    "duckduckbot",
    "baiduspider",
    "yandexbot",
    "sogou",
    "exabot",
    "facebookexternalhit",
    "facebot",
    "ia_archiver",
    "ahrefsbot",
    "semrushbot",
    "mj12bot",
    "dotbot",
    "petalbot",
    "bytespider",
    "gptbot",
    "ccbot",
    "claudebot",
    "amazonbot",
    "applebot",
    "twitterbot",
    "linkedinbot",
    "pinterestbot",
    "telegrambot",
    "discordbot",
    "headlesschrome",
    "phantomjs",
    "scrapy",
    "python-requests",
    "python-urllib",
    "aiohttp",
    "go-http-client",
    "curl/",
    "wget/",
    "libwww-perl",
    "okhttp",
    "crawler",
    "spider",
    "scraper",
];

/// True when the user agent carries a known crawler marker.
///
/// An empty (or absent) User-Agent is classified as a crawler: no mainstream
/// browser sends one.
pub fn is_crawler_signature(user_agent: &str) -> bool {
    if user_agent.trim().is_empty() {
        return true;
    }
    let ua = user_agent.to_ascii_lowercase();
    CRAWLER_MARKERS.iter().any(|marker| ua.contains(marker))
}
