//! Outbound alerting. Fire-and-forget: delivery failures are logged, never
//! propagated into the poll cycle.

use crate::feed::AnnouncementItem;
use crate::market::CompanySnapshot;
use async_trait::async_trait;
use tracing::{error, info};

/// Alert sink for newly enriched announcements.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, item: &AnnouncementItem, snapshot: &CompanySnapshot);
}

/// Telegram Bot API notifier.
pub struct TelegramNotifier {
    client: reqwest::Client,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
        }
    }

    fn format_message(item: &AnnouncementItem, snapshot: &CompanySnapshot) -> String {
        let mut msg = if item.is_price_sensitive {
            String::from("\u{1F4E2} <b>Price-sensitive announcement</b>\n")
        } else {
            String::from("<b>New announcement</b>\n")
        };
        msg.push_str(&format!("Symbol: {}\n", item.symbol));
        msg.push_str(&format!("Headline: {}\n", item.headline));
        if let Some(price) = snapshot.price_last {
            msg.push_str(&format!("Last price: {price}\n"));
        }
        if let Some(volume) = snapshot.volume {
            msg.push_str(&format!("Volume: {volume}\n"));
        }
        if let Some(url) = &item.url {
            msg.push_str(&format!("URL: {url}"));
        }
        msg
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, item: &AnnouncementItem, snapshot: &CompanySnapshot) {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);
        let text = Self::format_message(item, snapshot);

        let result = self
            .client
            .post(&url)
            .form(&[
                ("chat_id", self.chat_id.as_str()),
                ("text", text.as_str()),
                ("parse_mode", "HTML"),
            ])
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => {
                info!(symbol = %item.symbol, "telegram alert sent");
            }
            Ok(resp) => {
                error!(status = resp.status().as_u16(), "telegram API rejected message");
            }
            Err(e) => {
                error!("telegram send failed: {e}");
            }
        }
    }
}
