//! Auth token pool with durable, append-only storage and TTL refresh.
//!
//! Tokens are opaque `v` codes required on protected download URLs. Any
//! cached token is assumed interchangeable, so callers get a uniformly
//! random one. The pool is refreshed by a [`TokenScraper`] when stale or
//! empty, under a single-flight lock so concurrent callers never launch
//! overlapping browsers.

pub mod scraper;

use crate::error::{Result, WatchError};
use rand::seq::SliceRandom;
use scraper::TokenScraper;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

struct TokenPool {
    /// Insertion-ordered token list; `seen` mirrors it for dedupe.
    tokens: Vec<String>,
    seen: HashSet<String>,
    /// Unix seconds of the last refresh attempt.
    last_refresh: i64,
}

/// Durable token pool with browser-driven refresh.
pub struct TokenStore {
    tokens_file: PathBuf,
    stamp_file: PathBuf,
    ttl: Duration,
    scraper: Arc<dyn TokenScraper>,
    pool: Mutex<TokenPool>,
}

impl TokenStore {
    /// Load durable state from disk. Missing files mean an empty pool.
    pub fn open(
        tokens_file: PathBuf,
        stamp_file: PathBuf,
        ttl: Duration,
        scraper: Arc<dyn TokenScraper>,
    ) -> Result<Self> {
        if let Some(parent) = tokens_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let tokens: Vec<String> = match std::fs::read_to_string(&tokens_file) {
            Ok(contents) => contents
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        let seen: HashSet<String> = tokens.iter().cloned().collect();

        let last_refresh = std::fs::read_to_string(&stamp_file)
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0);

        info!(
            cached = tokens.len(),
            last_refresh, "token store loaded"
        );

        Ok(Self {
            tokens_file,
            stamp_file,
            ttl,
            scraper,
            pool: Mutex::new(TokenPool {
                tokens,
                seen,
                last_refresh,
            }),
        })
    }

    /// Number of tokens currently cached.
    pub async fn len(&self) -> usize {
        self.pool.lock().await.tokens.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Get a random valid token, refreshing the pool first when forced,
    /// empty, or older than the TTL.
    ///
    /// A failed refresh falls back to cached tokens (and still bumps the
    /// refresh stamp, so one flaky browser run cannot cause a refresh
    /// storm). Fails with [`WatchError::NoTokenAvailable`] only when the
    /// pool is empty and the refresh also yielded nothing.
    pub async fn token(&self, force_refresh: bool) -> Result<String> {
        // The pool lock doubles as the refresh single-flight guard.
        let mut pool = self.pool.lock().await;

        let now = chrono::Utc::now().timestamp();
        let stale = now.saturating_sub(pool.last_refresh) > self.ttl.as_secs() as i64;
        if force_refresh || pool.tokens.is_empty() || stale {
            let found = self.scraper.scrape().await;
            if !found.is_empty() {
                self.append_new(&mut pool, found)?;
                self.write_stamp(&mut pool, now)?;
            } else if pool.tokens.is_empty() {
                return Err(WatchError::NoTokenAvailable);
            } else {
                warn!("token refresh yielded nothing, continuing with cached tokens");
                self.write_stamp(&mut pool, now)?;
            }
        }

        pool.tokens
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or(WatchError::NoTokenAvailable)
    }

    /// Force a refresh and report how many tokens were newly discovered.
    pub async fn refresh(&self) -> Result<usize> {
        let mut pool = self.pool.lock().await;
        let before = pool.tokens.len();
        let found = self.scraper.scrape().await;
        let now = chrono::Utc::now().timestamp();
        if !found.is_empty() {
            self.append_new(&mut pool, found)?;
        }
        self.write_stamp(&mut pool, now)?;
        Ok(pool.tokens.len() - before)
    }

    /// Union newly discovered tokens into the pool and the append-only file.
    fn append_new(&self, pool: &mut TokenPool, found: HashSet<String>) -> Result<()> {
        use std::io::Write;

        let fresh: Vec<String> = found
            .into_iter()
            .filter(|t| !pool.seen.contains(t))
            .collect();
        if fresh.is_empty() {
            return Ok(());
        }

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.tokens_file)?;
        for token in &fresh {
            writeln!(file, "{token}")?;
        }

        info!(new = fresh.len(), total = pool.tokens.len() + fresh.len(), "token pool grew");
        for token in fresh {
            pool.seen.insert(token.clone());
            pool.tokens.push(token);
        }
        Ok(())
    }

    fn write_stamp(&self, pool: &mut TokenPool, now: i64) -> Result<()> {
        std::fs::write(&self.stamp_file, now.to_string())?;
        pool.last_refresh = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct FixedScraper {
        tokens: Vec<&'static str>,
        calls: AtomicUsize,
    }

    impl FixedScraper {
        fn new(tokens: Vec<&'static str>) -> Self {
            Self {
                tokens,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TokenScraper for FixedScraper {
        async fn scrape(&self) -> HashSet<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.tokens.iter().map(|t| t.to_string()).collect()
        }
    }

    fn store_in(dir: &TempDir, scraper: Arc<dyn TokenScraper>) -> TokenStore {
        TokenStore::open(
            dir.path().join("tokens.txt"),
            dir.path().join("stamp.txt"),
            Duration::from_secs(24 * 3600),
            scraper,
        )
        .unwrap()
    }

    /// Scraper that takes a while, so overlapping callers would double-count.
    struct SlowScraper {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TokenScraper for SlowScraper {
        async fn scrape(&self) -> HashSet<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            std::iter::once("tok-slow".to_string()).collect()
        }
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let dir = TempDir::new().unwrap();
        let scraper = Arc::new(SlowScraper {
            calls: AtomicUsize::new(0),
        });
        let store = Arc::new(store_in(&dir, scraper.clone()));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.token(false).await }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "tok-slow");
        }

        // Only the first caller scrapes; the rest find a fresh pool.
        assert_eq!(scraper.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_pool_triggers_refresh() {
        let dir = TempDir::new().unwrap();
        let scraper = Arc::new(FixedScraper::new(vec!["tok-a", "tok-b"]));
        let store = store_in(&dir, scraper.clone());

        let token = store.token(false).await.unwrap();
        assert!(token == "tok-a" || token == "tok-b");
        assert_eq!(scraper.calls.load(Ordering::SeqCst), 1);

        // Fresh pool within TTL: no second scrape.
        store.token(false).await.unwrap();
        assert_eq!(scraper.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_falls_back_to_cache() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("tokens.txt"), "abc\n").unwrap();
        // Stale stamp forces a refresh attempt, which yields nothing.
        std::fs::write(dir.path().join("stamp.txt"), "0").unwrap();
        let store = store_in(&dir, Arc::new(FixedScraper::new(vec![])));

        let token = store.token(false).await.unwrap();
        assert_eq!(token, "abc");

        // The stamp was still bumped, so the next call skips the scraper.
        let stamp: i64 = std::fs::read_to_string(dir.path().join("stamp.txt"))
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        assert!(stamp > 0);
    }

    #[tokio::test]
    async fn test_empty_pool_and_failed_refresh_errors() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, Arc::new(FixedScraper::new(vec![])));
        assert!(matches!(
            store.token(false).await,
            Err(WatchError::NoTokenAvailable)
        ));
    }

    #[tokio::test]
    async fn test_token_file_is_append_only() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("tokens.txt"), "old\n").unwrap();
        std::fs::write(dir.path().join("stamp.txt"), "0").unwrap();
        let store = store_in(&dir, Arc::new(FixedScraper::new(vec!["new", "old"])));

        store.token(false).await.unwrap();
        let contents = std::fs::read_to_string(dir.path().join("tokens.txt")).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "old");
        assert_eq!(lines.len(), 2);
        assert!(lines.contains(&"new"));
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_forced_refresh_reports_new_tokens() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, Arc::new(FixedScraper::new(vec!["x", "y"])));
        assert_eq!(store.refresh().await.unwrap(), 2);
        assert_eq!(store.refresh().await.unwrap(), 0);
    }
}
