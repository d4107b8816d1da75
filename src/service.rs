//! Poll-cycle orchestration.
//!
//! One cycle: token → feed → URL decoration → new-item detection → bounded
//! fan-out of per-symbol enrichment → persistence and notification. Every
//! per-symbol failure is isolated; only total feed failure or total token
//! unavailability ends a cycle early, and even then the loop carries on with
//! the next cycle.

use crate::auth::TokenStore;
use crate::client::RateLimitedClient;
use crate::config::Config;
use crate::error::WatchError;
use crate::feed::{self, AnnouncementItem};
use crate::market::MarketData;
use crate::notify::Notifier;
use crate::render;
use crate::store::RecordStore;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// The announcement watcher service.
pub struct AnnouncementWatcher {
    cfg: Config,
    client: Arc<RateLimitedClient>,
    tokens: Arc<TokenStore>,
    market: Arc<dyn MarketData>,
    store: Arc<dyn RecordStore>,
    notifier: Option<Arc<dyn Notifier>>,
    /// Fan-out permits; sized to the client's in-flight cap on purpose so
    /// symbol tasks cannot oversubscribe the upstream twice over.
    fanout: Arc<Semaphore>,
}

impl AnnouncementWatcher {
    pub fn new(
        cfg: Config,
        client: Arc<RateLimitedClient>,
        tokens: Arc<TokenStore>,
        market: Arc<dyn MarketData>,
        store: Arc<dyn RecordStore>,
        notifier: Option<Arc<dyn Notifier>>,
    ) -> Self {
        let fanout = Arc::new(Semaphore::new(cfg.client.max_in_flight));
        Self {
            cfg,
            client,
            tokens,
            market,
            store,
            notifier,
            fanout,
        }
    }

    /// Poll until the shutdown receiver fires. The cycle in progress always
    /// drains before the loop exits.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!("announcement watcher started");
        loop {
            self.run_cycle().await;

            if *shutdown.borrow() {
                break;
            }
            let wait = self.next_interval();
            if !render::wait_with_countdown(wait, &mut shutdown).await {
                break;
            }
        }
        info!("announcement watcher stopped");
    }

    /// One polling iteration. Never panics the loop; all failure modes are
    /// logged and simply end the cycle.
    pub async fn run_cycle(&self) {
        let token = match self.tokens.token(false).await {
            Ok(token) => token,
            Err(e) => {
                warn!("no auth token for this cycle: {e}");
                return;
            }
        };

        let feed_json = match self.client.get_json(&self.cfg.feed_url).await {
            Ok(value) => value,
            Err(e) => {
                error!("announcements feed fetch failed: {e}");
                return;
            }
        };

        let mut items = feed::parse_items(&feed_json);
        info!(count = items.len(), "fetched announcements");
        if items.is_empty() {
            return;
        }

        for item in &mut items {
            item.url = Some(self.cfg.download_url(&item.document_key, &token));
        }

        let new_items = match self.store.insert_new_announcements(&items).await {
            Ok(new_items) => new_items,
            Err(e) => {
                error!("announcement insert failed: {e}");
                return;
            }
        };
        if new_items.is_empty() {
            info!("no new announcements");
            return;
        }

        render::render_announcements(&new_items);

        let mut tasks = JoinSet::new();
        for item in new_items {
            if item.symbol.is_empty() {
                continue;
            }
            let permits = Arc::clone(&self.fanout);
            let market = Arc::clone(&self.market);
            let store = Arc::clone(&self.store);
            let notifier = self.notifier.clone();
            let timeout = self.cfg.symbol_timeout;

            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await.expect("fanout semaphore closed");
                enrich_symbol(item, market, store, notifier, timeout).await;
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!("symbol task panicked: {e}");
            }
        }
    }

    /// Per-cycle wait, drawn uniformly from the configured interval bounds.
    fn next_interval(&self) -> Duration {
        let min = self.cfg.poll_interval_min;
        let max = self.cfg.poll_interval_max;
        if max <= min {
            return min;
        }
        let millis = rand::thread_rng().gen_range(min.as_millis()..=max.as_millis());
        Duration::from_millis(millis as u64)
    }
}

/// Enrich one symbol under a deadline, then persist and notify.
///
/// Timeout abandons the enrichment (the in-flight sub-fetch futures are
/// dropped with it); nothing here can fail the surrounding cycle.
async fn enrich_symbol(
    item: AnnouncementItem,
    market: Arc<dyn MarketData>,
    store: Arc<dyn RecordStore>,
    notifier: Option<Arc<dyn Notifier>>,
    timeout: Duration,
) {
    let symbol = item.symbol.clone();

    let bundle = match tokio::time::timeout(timeout, market.fetch_all(&symbol)).await {
        Ok(bundle) => bundle,
        Err(_) => {
            warn!(symbol, "{}", WatchError::Timeout(timeout));
            return;
        }
    };

    if bundle.is_empty() {
        warn!(symbol, "no market data");
        return;
    }

    if !bundle.snapshot.is_empty() {
        if let Err(e) = store.upsert_company_snapshot(&bundle.snapshot).await {
            error!(symbol, "snapshot upsert failed: {e}");
        }
    }
    if !bundle.volumes.is_empty() {
        if let Err(e) = store.insert_volume_points(&symbol, &bundle.volumes).await {
            error!(symbol, "volume insert failed: {e}");
        }
    }

    if let Some(notifier) = notifier {
        notifier.notify(&item, &bundle.snapshot).await;
    }
}
