//! Console presentation: new-announcements table and the poll countdown.
//!
//! Side-effect only; nothing here feeds back into the pipeline.

use crate::feed::AnnouncementItem;
use std::time::Duration;

const URL_DISPLAY_LIMIT: usize = 50;

/// Print a plain table of newly observed announcements.
pub fn render_announcements(items: &[AnnouncementItem]) {
    if items.is_empty() {
        println!("No new announcements");
        return;
    }

    println!("New announcements:");
    println!(
        "  {:<8} {:<40} {:<20} {:<5} URL",
        "Symbol", "Headline", "Date", "PS"
    );
    for item in items {
        let date = item.date.replace('T', " ");
        let date = date.split('.').next().unwrap_or(&date);
        println!(
            "  {:<8} {:<40} {:<20} {:<5} {}",
            truncate(&item.symbol, 8),
            truncate(&item.headline, 40),
            truncate(date, 20),
            if item.is_price_sensitive { "YES" } else { "no" },
            truncate(item.url.as_deref().unwrap_or(""), URL_DISPLAY_LIMIT),
        );
    }
}

/// Countdown until the next poll. Returns early (false) when the shutdown
/// receiver fires; rendering of remaining seconds is purely cosmetic.
pub async fn wait_with_countdown(
    total: Duration,
    shutdown: &mut tokio::sync::watch::Receiver<bool>,
) -> bool {
    let mut remaining = total.as_secs();
    while remaining > 0 {
        eprint!("\rNext check in {remaining} seconds...  ");
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(1)) => {
                remaining -= 1;
            }
            _ = shutdown.changed() => {
                eprintln!();
                return false;
            }
        }
    }
    eprint!("\r{:50}\r", "");
    true
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_keeps_short_strings() {
        assert_eq!(truncate("BHP", 8), "BHP");
        assert_eq!(truncate("exactly8", 8), "exactly8");
    }

    #[test]
    fn test_truncate_marks_long_strings() {
        let long = "https://example.com/a/very/long/path/to/a/document";
        let out = truncate(long, 20);
        assert_eq!(out.chars().count(), 20);
        assert!(out.ends_with("..."));
    }

    #[tokio::test]
    async fn test_countdown_interrupted_by_shutdown() {
        let (tx, mut rx) = tokio::sync::watch::channel(false);
        tx.send(true).unwrap();
        let finished = wait_with_countdown(Duration::from_secs(60), &mut rx).await;
        assert!(!finished);
    }

    #[tokio::test]
    async fn test_countdown_completes_zero_duration() {
        let (_tx, mut rx) = tokio::sync::watch::channel(false);
        assert!(wait_with_countdown(Duration::ZERO, &mut rx).await);
    }
}
