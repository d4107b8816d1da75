//! CLI command implementations.

pub mod doctor;
pub mod run_cmd;
pub mod tokens_cmd;

use crate::auth::scraper::ChromiumTokenScraper;
use crate::auth::TokenStore;
use crate::client::RateLimitedClient;
use crate::config::Config;
use crate::market::MarketDataAggregator;
use crate::notify::{Notifier, TelegramNotifier};
use crate::service::AnnouncementWatcher;
use crate::store::SqliteStore;
use anyhow::{Context, Result};
use std::sync::Arc;

/// Wire the watcher together from configuration.
pub fn build_watcher(cfg: Config) -> Result<AnnouncementWatcher> {
    let client = Arc::new(
        RateLimitedClient::new(cfg.client.clone()).context("failed to build HTTP client")?,
    );

    let scraper = Arc::new(ChromiumTokenScraper::new(cfg.listing_page_url.clone()));
    let tokens = Arc::new(
        TokenStore::open(
            cfg.tokens_file(),
            cfg.token_stamp_file(),
            cfg.token_ttl,
            scraper,
        )
        .context("failed to open token store")?,
    );

    let market = Arc::new(MarketDataAggregator::new(
        Arc::clone(&client),
        cfg.company_api_base.clone(),
    ));

    let store =
        Arc::new(SqliteStore::open(&cfg.db_path()).context("failed to open record store")?);

    let notifier: Option<Arc<dyn Notifier>> = if cfg.telegram_enabled() {
        Some(Arc::new(TelegramNotifier::new(
            cfg.telegram_bot_token.clone().unwrap_or_default(),
            cfg.telegram_chat_id.clone().unwrap_or_default(),
        )))
    } else {
        None
    };

    Ok(AnnouncementWatcher::new(
        cfg, client, tokens, market, store, notifier,
    ))
}
