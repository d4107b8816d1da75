//! Browser-driven token harvesting.
//!
//! The announcements listing page lazily injects authenticated CDN download
//! links as it is scrolled. We drive a headless Chromium instance, scroll
//! until the page stops growing, and pull the `v` query parameter out of
//! every protected-resource URL in the rendered markup.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use regex::Regex;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Source of fresh auth tokens.
///
/// `scrape` never errors: navigation timeouts, missing Chromium, and empty
/// pages all degrade to an empty set, which the token store interprets as
/// "refresh failed".
#[async_trait]
pub trait TokenScraper: Send + Sync {
    async fn scrape(&self) -> HashSet<String>;
}

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. ANNWATCH_CHROMIUM_PATH env
    if let Ok(p) = std::env::var("ANNWATCH_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 3. Common macOS location
    if cfg!(target_os = "macos") {
        let common = PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Headless-Chromium token scraper.
pub struct ChromiumTokenScraper {
    listing_url: String,
    /// Maximum scroll iterations before giving up on new content.
    scroll_rounds: usize,
    /// Settle delay after the initial load and after each scroll.
    settle_delay: Duration,
    navigation_timeout: Duration,
}

impl ChromiumTokenScraper {
    pub fn new(listing_url: impl Into<String>) -> Self {
        Self {
            listing_url: listing_url.into(),
            scroll_rounds: 5,
            settle_delay: Duration::from_secs(2),
            navigation_timeout: Duration::from_secs(15),
        }
    }

    async fn scrape_inner(&self) -> anyhow::Result<HashSet<String>> {
        let chrome_path = find_chromium()
            .ok_or_else(|| anyhow::anyhow!("Chromium not found; set ANNWATCH_CHROMIUM_PATH"))?;

        let config = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (mut browser, mut handler) = Browser::launch(config).await?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        // Teardown must run on every exit path, so the page work is scoped.
        let result = self.harvest_from_browser(&browser).await;

        if let Err(e) = browser.close().await {
            warn!("browser close failed: {e}");
        }
        handler_task.abort();

        result
    }

    async fn harvest_from_browser(&self, browser: &Browser) -> anyhow::Result<HashSet<String>> {
        info!(url = %self.listing_url, "scraping tokens via headless browser");

        let page = browser.new_page("about:blank").await?;
        tokio::time::timeout(self.navigation_timeout, page.goto(self.listing_url.as_str()))
            .await
            .map_err(|_| anyhow::anyhow!("navigation timed out"))??;
        let _ = page.wait_for_navigation().await;
        tokio::time::sleep(self.settle_delay).await;

        let mut last_height = page_height(&page).await.unwrap_or(0);
        for round in 0..self.scroll_rounds {
            let _ = page
                .evaluate("window.scrollTo(0, document.body.scrollHeight)")
                .await;
            tokio::time::sleep(self.settle_delay).await;

            let new_height = page_height(&page).await.unwrap_or(last_height);
            if new_height == last_height {
                debug!(round, "page height unchanged, stopping scroll");
                break;
            }
            last_height = new_height;
        }

        let html: String = page
            .evaluate("document.documentElement.outerHTML")
            .await?
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to read page HTML: {e:?}"))?;

        let _ = page.close().await;

        let tokens = harvest_tokens(&html);
        info!(count = tokens.len(), "extracted tokens from rendered page");
        Ok(tokens)
    }
}

async fn page_height(page: &Page) -> Option<i64> {
    page.evaluate("document.body.scrollHeight")
        .await
        .ok()?
        .into_value()
        .ok()
}

#[async_trait]
impl TokenScraper for ChromiumTokenScraper {
    async fn scrape(&self) -> HashSet<String> {
        match self.scrape_inner().await {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!("token scrape failed: {e}");
                HashSet::new()
            }
        }
    }
}

/// Scan rendered markup for protected-resource URLs and collect their `v`
/// query parameters.
pub fn harvest_tokens(html: &str) -> HashSet<String> {
    static CDN_RE: OnceLock<Regex> = OnceLock::new();
    let cdn_re = CDN_RE.get_or_init(|| {
        Regex::new(r#"(?i)https?://cdn-api\.markitdigital\.com/[^"'\s>]*?/file/[^"'\s>]+"#)
            .expect("cdn url regex")
    });

    cdn_re
        .find_iter(html)
        .filter_map(|m| extract_token(m.as_str()))
        .collect()
}

/// Pull the `v` parameter out of one URL, handling HTML entity escaping and
/// percent encoding.
fn extract_token(raw_url: &str) -> Option<String> {
    let unescaped = quick_xml::escape::unescape(raw_url)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw_url.to_string());

    if let Ok(parsed) = url::Url::parse(&unescaped) {
        if let Some((_, value)) = parsed.query_pairs().find(|(k, _)| k == "v") {
            if !value.is_empty() {
                return Some(value.into_owned());
            }
        }
    }

    // Fallback for URLs the parser rejects.
    static V_RE: OnceLock<Regex> = OnceLock::new();
    let v_re = V_RE.get_or_init(|| Regex::new(r#"[?&]v=([^&'#"\s]+)"#).expect("v param regex"));
    v_re.captures(&unescaped)
        .map(|c| c[1].to_string())
        .filter(|v| !v.is_empty())
}
