//! Rate-limited async HTTP client wrapping reqwest.
//!
//! Shared by the feed poll and every per-symbol sub-fetch. Enforces a global
//! in-flight cap, a rolling one-minute burst window with a randomized soft
//! cooldown, round-robin header rotation, optional proxy rotation, and retry
//! with exponential backoff. A non-2xx status or a "rate limit" marker in the
//! body is treated as transient: sleep the long cooldown, then let the outer
//! retry loop decide.

pub mod headers;

use crate::config::ClientConfig;
use crate::error::{Result, WatchError};
use headers::HeaderProfile;
use rand::Rng;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Rotation and burst-window state, mutated under one lock.
struct RotationState {
    header_index: usize,
    window_start: Instant,
    window_count: u32,
}

/// HTTP client with throttling and anti-rate-limit heuristics.
pub struct RateLimitedClient {
    /// One reqwest client per proxy; a single direct client when none are
    /// configured. Chosen at random per request.
    clients: Vec<reqwest::Client>,
    header_pool: Vec<HeaderProfile>,
    permits: Semaphore,
    state: Mutex<RotationState>,
    cfg: ClientConfig,
}

impl RateLimitedClient {
    /// Build the client pool from the configuration.
    pub fn new(cfg: ClientConfig) -> Result<Self> {
        let mut clients = Vec::new();
        if cfg.proxies.is_empty() {
            clients.push(build_client(&cfg, None)?);
        } else {
            for proxy in &cfg.proxies {
                clients.push(build_client(&cfg, Some(proxy))?);
            }
        }

        Ok(Self {
            clients,
            header_pool: headers::default_pool(),
            permits: Semaphore::new(cfg.max_in_flight),
            state: Mutex::new(RotationState {
                header_index: 0,
                window_start: Instant::now(),
                window_count: 0,
            }),
            cfg,
        })
    }

    /// GET a JSON document, retrying transient failures.
    ///
    /// Fails with [`WatchError::FetchFailed`] once attempts are exhausted;
    /// callers treat that as "no data for this call", never as fatal.
    pub async fn get_json(&self, url: &str) -> Result<serde_json::Value> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.try_get_json(url).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.cfg.retry_attempts => {
                    let delay = self.backoff_delay(attempt);
                    warn!(url, attempt, ?delay, error = %e, "request failed, backing off");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    warn!(url, attempt, error = %e, "request failed, retries exhausted");
                    return Err(WatchError::FetchFailed {
                        url: url.to_string(),
                        attempts: attempt,
                    });
                }
            }
        }
    }

    async fn try_get_json(&self, url: &str) -> Result<serde_json::Value> {
        self.throttle().await;
        let profile = self.next_header_profile();
        let client = self.pick_client();

        let _permit = self
            .permits
            .acquire()
            .await
            .expect("client semaphore closed");

        debug!(url, ua = profile.user_agent, "requesting");
        let response = client
            .get(url)
            .header("User-Agent", profile.user_agent)
            .header("Accept", "application/json, text/plain, */*")
            .header("Accept-Language", profile.accept_language)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() || body.to_lowercase().contains("rate limit") {
            warn!(url, status = status.as_u16(), "rate limited or rejected, pausing");
            tokio::time::sleep(self.cfg.rate_limit_pause).await;
            return Err(WatchError::RateLimited {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        serde_json::from_str(&body)
            .map_err(|e| WatchError::Parse(format!("invalid JSON from {url}: {e}")))
    }

    /// Apply the rolling burst window; sleeps the randomized cooldown once
    /// the limit is reached. The count keeps advancing — this is a soft
    /// cooldown, not a hard queue.
    async fn throttle(&self) {
        let cooldown = {
            let mut state = self.state.lock().expect("client state poisoned");
            if state.window_start.elapsed() > self.cfg.burst_window {
                state.window_start = Instant::now();
                state.window_count = 0;
            }
            let over_limit = state.window_count >= self.cfg.burst_limit;
            state.window_count += 1;
            over_limit
        };

        if cooldown {
            let pause = random_duration(self.cfg.burst_cooldown_min, self.cfg.burst_cooldown_max);
            debug!(?pause, "burst limit reached, cooling down");
            tokio::time::sleep(pause).await;
        }
    }

    fn next_header_profile(&self) -> HeaderProfile {
        let mut state = self.state.lock().expect("client state poisoned");
        state.header_index = (state.header_index + 1) % self.header_pool.len();
        self.header_pool[state.header_index].clone()
    }

    fn pick_client(&self) -> &reqwest::Client {
        if self.clients.len() == 1 {
            &self.clients[0]
        } else {
            &self.clients[rand::thread_rng().gen_range(0..self.clients.len())]
        }
    }

    /// Backoff doubled per attempt, clamped to [floor, ceiling].
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = self
            .cfg
            .backoff_base
            .saturating_mul(1u32 << (attempt - 1).min(16));
        exp.clamp(self.cfg.backoff_floor, self.cfg.backoff_ceiling)
    }
}

fn build_client(cfg: &ClientConfig, proxy: Option<&str>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .timeout(cfg.request_timeout)
        .redirect(reqwest::redirect::Policy::limited(5));
    if let Some(proxy) = proxy {
        builder = builder.proxy(reqwest::Proxy::all(proxy)?);
    }
    Ok(builder.build()?)
}

fn random_duration(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let millis = rand::thread_rng().gen_range(min.as_millis()..=max.as_millis());
    Duration::from_millis(millis as u64)
}
