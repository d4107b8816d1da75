//! `tokens`: inspect or refresh the auth token pool.

use crate::auth::scraper::ChromiumTokenScraper;
use crate::auth::TokenStore;
use crate::config::Config;
use anyhow::{Context, Result};
use std::sync::Arc;

pub async fn run(cfg: Config, refresh: bool) -> Result<()> {
    let scraper = Arc::new(ChromiumTokenScraper::new(cfg.listing_page_url.clone()));
    let store = TokenStore::open(
        cfg.tokens_file(),
        cfg.token_stamp_file(),
        cfg.token_ttl,
        scraper,
    )
    .context("failed to open token store")?;

    if refresh {
        println!("Refreshing token pool via headless browser...");
        let added = store.refresh().await?;
        println!("Discovered {added} new token(s).");
    }

    println!(
        "Token pool: {} cached token(s) in {}",
        store.len().await,
        cfg.tokens_file().display()
    );
    Ok(())
}
