//! `doctor`: environment readiness check.

use crate::auth::scraper::find_chromium;
use crate::config::Config;
use crate::store::SqliteStore;
use anyhow::Result;

pub async fn run(cfg: Config) -> Result<()> {
    println!("announce-watch doctor");
    println!("=====================");
    println!();

    let os = std::env::consts::OS;
    let arch = std::env::consts::ARCH;
    println!("OS:   {os}");
    println!("Arch: {arch}");
    println!();

    // Chromium is only needed for token refresh, but without it a cold
    // start has no way to populate the pool.
    let chromium = find_chromium();
    match &chromium {
        Some(path) => println!("[OK] Chromium found: {}", path.display()),
        None => println!(
            "[!!] Chromium NOT found. Install Chrome/Chromium or set ANNWATCH_CHROMIUM_PATH."
        ),
    }

    // Data directory and database
    match std::fs::create_dir_all(&cfg.data_dir) {
        Ok(()) => println!("[OK] Data directory writable: {}", cfg.data_dir.display()),
        Err(e) => println!("[!!] Data directory not writable ({e}): {}", cfg.data_dir.display()),
    }
    let db_ok = match SqliteStore::open(&cfg.db_path()) {
        Ok(_) => {
            println!("[OK] Database opens: {}", cfg.db_path().display());
            true
        }
        Err(e) => {
            println!("[!!] Database failed to open: {e}");
            false
        }
    };

    let cached_tokens = std::fs::read_to_string(cfg.tokens_file())
        .map(|c| c.lines().filter(|l| !l.trim().is_empty()).count())
        .unwrap_or(0);
    println!("[  ] Cached tokens: {cached_tokens}");

    if cfg.telegram_enabled() {
        println!("[OK] Telegram alerts configured");
    } else {
        println!("[  ] Telegram alerts disabled (set ANNWATCH_TELEGRAM_BOT_TOKEN / _CHAT_ID)");
    }

    println!();
    let ready = db_ok && (chromium.is_some() || cached_tokens > 0);
    if ready {
        println!("Status: READY");
    } else {
        println!("Status: NOT READY");
        println!("  A browser or a cached token pool is required for the first cycle.");
    }

    Ok(())
}
