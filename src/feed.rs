//! Announcements feed model.
//!
//! Upstream fields are loosely typed: anything missing deserializes to its
//! default rather than failing the whole item. The download `url` is derived
//! locally from the current auth token, never supplied by the feed.

use serde::{Deserialize, Serialize};

/// One announcement from the feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnouncementItem {
    pub document_key: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub headline: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub is_price_sensitive: bool,
    /// Derived authenticated download URL; absent until decorated.
    #[serde(default)]
    pub url: Option<String>,
}

/// Pull the item list out of a feed response.
///
/// Items without a document key, or otherwise malformed, are skipped.
pub fn parse_items(feed: &serde_json::Value) -> Vec<AnnouncementItem> {
    let Some(items) = feed
        .get("data")
        .and_then(|d| d.get("items"))
        .and_then(|i| i.as_array())
    else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|raw| serde_json::from_value(raw.clone()).ok())
        .filter(|item: &AnnouncementItem| !item.document_key.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_items_tolerates_missing_fields() {
        let feed = json!({
            "data": {
                "items": [
                    {"documentKey": "k1", "symbol": "BHP", "headline": "H",
                     "date": "2026-08-26T09:00:00", "isPriceSensitive": true},
                    {"documentKey": "k2"},
                    {"headline": "no key"},
                    "not an object"
                ]
            }
        });
        let items = parse_items(&feed);
        assert_eq!(items.len(), 2);
        assert!(items[0].is_price_sensitive);
        assert_eq!(items[1].symbol, "");
        assert!(items[1].url.is_none());
    }

    #[test]
    fn test_parse_items_handles_wrong_shape() {
        assert!(parse_items(&json!({"data": {}})).is_empty());
        assert!(parse_items(&json!(null)).is_empty());
        assert!(parse_items(&json!({"data": {"items": "nope"}})).is_empty());
    }
}
