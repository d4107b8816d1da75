//! Runtime configuration: endpoint URLs, throttling knobs, and on-disk paths.
//!
//! Defaults are suitable for the public ASX announcements feed. Every value
//! can be overridden via `ANNWATCH_*` environment variables; tests construct
//! a [`Config`] directly with tiny durations instead.

use std::path::PathBuf;
use std::time::Duration;

/// Throttling and retry knobs for the HTTP client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Maximum requests in flight at once.
    pub max_in_flight: usize,
    /// Requests allowed per rolling 60-second window before a cooldown.
    pub burst_limit: u32,
    /// Length of the rolling burst window.
    pub burst_window: Duration,
    /// Randomized cooldown range applied once the burst limit is reached.
    pub burst_cooldown_min: Duration,
    pub burst_cooldown_max: Duration,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Total attempts per call (first try included).
    pub retry_attempts: u32,
    /// Exponential backoff: base doubled per attempt, clamped to the range.
    pub backoff_base: Duration,
    pub backoff_floor: Duration,
    pub backoff_ceiling: Duration,
    /// Fixed pause after a rate-limit signal, before failing the attempt.
    pub rate_limit_pause: Duration,
    /// Optional proxy URLs, one client per proxy, chosen at random.
    pub proxies: Vec<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 3,
            burst_limit: 10,
            burst_window: Duration::from_secs(60),
            burst_cooldown_min: Duration::from_secs(20),
            burst_cooldown_max: Duration::from_secs(40),
            request_timeout: Duration::from_secs(15),
            retry_attempts: 3,
            backoff_base: Duration::from_secs(2),
            backoff_floor: Duration::from_secs(4),
            backoff_ceiling: Duration::from_secs(30),
            rate_limit_pause: Duration::from_secs(600),
            proxies: Vec::new(),
        }
    }
}

/// Full watcher configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Announcements feed endpoint.
    pub feed_url: String,
    /// Base URL for per-company endpoints (header, key-statistics, charts).
    pub company_api_base: String,
    /// Base URL for authenticated document downloads; the document key is
    /// appended, followed by `?v=<token>`.
    pub download_base: String,
    /// Public listing page the token scraper drives a browser against.
    pub listing_page_url: String,
    /// Directory holding the token file, refresh stamp, and sqlite db.
    pub data_dir: PathBuf,
    /// Token pool TTL before a browser-driven refresh is attempted.
    pub token_ttl: Duration,
    /// Per-symbol enrichment deadline.
    pub symbol_timeout: Duration,
    /// Poll interval bounds; the actual wait is drawn uniformly per cycle.
    pub poll_interval_min: Duration,
    pub poll_interval_max: Duration,
    /// Telegram credentials; alerts are disabled when unset.
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    /// HTTP client knobs.
    pub client: ClientConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed_url: "https://asx.api.markitdigital.com/asx-research/1.0/markets/announcements"
                .to_string(),
            company_api_base: "https://asx.api.markitdigital.com/asx-research/1.0/companies"
                .to_string(),
            download_base:
                "https://cdn-api.markitdigital.com/apiman-gateway/ASX/asx-research/1.0/file"
                    .to_string(),
            listing_page_url: "https://www.asx.com.au/markets/trade-our-cash-market/announcements"
                .to_string(),
            data_dir: default_data_dir(),
            token_ttl: Duration::from_secs(24 * 3600),
            symbol_timeout: Duration::from_secs(30),
            poll_interval_min: Duration::from_secs(300),
            poll_interval_max: Duration::from_secs(300),
            telegram_bot_token: None,
            telegram_chat_id: None,
            client: ClientConfig::default(),
        }
    }
}

impl Config {
    /// Defaults plus `ANNWATCH_*` environment overrides.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(dir) = std::env::var("ANNWATCH_DATA_DIR") {
            cfg.data_dir = PathBuf::from(dir);
        }
        if let Ok(url) = std::env::var("ANNWATCH_FEED_URL") {
            cfg.feed_url = url;
        }
        if let Ok(url) = std::env::var("ANNWATCH_COMPANY_API_BASE") {
            cfg.company_api_base = url;
        }
        if let Some(secs) = read_env_u64("ANNWATCH_POLL_INTERVAL_SECS") {
            cfg.poll_interval_min = Duration::from_secs(secs);
            cfg.poll_interval_max = Duration::from_secs(secs);
        }
        if let Some(n) = read_env_u64("ANNWATCH_BURST_LIMIT") {
            cfg.client.burst_limit = n as u32;
        }
        if let Some(n) = read_env_u64("ANNWATCH_MAX_IN_FLIGHT") {
            cfg.client.max_in_flight = n.max(1) as usize;
        }
        if let Ok(proxies) = std::env::var("ANNWATCH_PROXIES") {
            cfg.client.proxies = proxies
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();
        }
        cfg.telegram_bot_token = std::env::var("ANNWATCH_TELEGRAM_BOT_TOKEN").ok();
        cfg.telegram_chat_id = std::env::var("ANNWATCH_TELEGRAM_CHAT_ID").ok();

        cfg
    }

    /// Append-only file of every token ever observed.
    pub fn tokens_file(&self) -> PathBuf {
        self.data_dir.join("tokens.txt")
    }

    /// Unix-seconds timestamp of the last refresh attempt.
    pub fn token_stamp_file(&self) -> PathBuf {
        self.data_dir.join("token_refresh_stamp.txt")
    }

    /// SQLite database holding announcements, snapshots, and volumes.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("announcements.db")
    }

    /// Authenticated download URL for one document.
    pub fn download_url(&self, document_key: &str, token: &str) -> String {
        format!("{}/{document_key}?v={token}", self.download_base)
    }

    /// Telegram alerting is enabled only when both credentials are present.
    pub fn telegram_enabled(&self) -> bool {
        self.telegram_bot_token.is_some() && self.telegram_chat_id.is_some()
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(".announce-watch")
}

fn read_env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_url_format() {
        let cfg = Config::default();
        let url = cfg.download_url("abc123", "tok");
        assert!(url.ends_with("/file/abc123?v=tok"));
    }

    #[test]
    fn test_telegram_disabled_without_both_credentials() {
        let mut cfg = Config::default();
        assert!(!cfg.telegram_enabled());
        cfg.telegram_bot_token = Some("t".into());
        assert!(!cfg.telegram_enabled());
        cfg.telegram_chat_id = Some("c".into());
        assert!(cfg.telegram_enabled());
    }
}
