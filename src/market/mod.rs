//! Per-symbol market data aggregation.
//!
//! Three upstream calls per symbol — header, key statistics, and the
//! five-day volume chart — each independently tolerant of failure. Partial
//! success is the default: the bundle carries whatever subset came back, and
//! is empty only when every sub-fetch failed or yielded nothing usable.

pub mod chart;

use crate::client::RateLimitedClient;
use async_trait::async_trait;
use chart::VolumePoint;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

/// Merged company market data. Every field is optional; absence means the
/// sub-fetch that carries it failed. Field sets from the two JSON endpoints
/// are disjoint, so the merge is a simple union.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CompanySnapshot {
    pub symbol: Option<String>,
    pub price_last: Option<f64>,
    pub price_change: Option<f64>,
    pub volume: Option<i64>,
    pub market_cap: Option<i64>,
    pub volume_average: Option<f64>,
    pub num_of_shares: Option<i64>,
    pub net_income: Option<f64>,
    /// Stamped at fetch time, not an upstream timestamp.
    pub last_updated: Option<String>,
}

impl CompanySnapshot {
    pub fn is_empty(&self) -> bool {
        self.symbol.is_none()
            && self.price_last.is_none()
            && self.price_change.is_none()
            && self.volume.is_none()
            && self.market_cap.is_none()
            && self.volume_average.is_none()
            && self.num_of_shares.is_none()
            && self.net_income.is_none()
    }
}

/// Everything gathered for one symbol.
#[derive(Debug, Clone, Default)]
pub struct SymbolBundle {
    pub snapshot: CompanySnapshot,
    pub volumes: Vec<VolumePoint>,
}

impl SymbolBundle {
    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty() && self.volumes.is_empty()
    }
}

/// Market data source, substitutable in tests.
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Fetch whatever market data is available for one symbol.
    async fn fetch_all(&self, symbol: &str) -> SymbolBundle;
}

/// Aggregator over the company API endpoints.
pub struct MarketDataAggregator {
    client: Arc<RateLimitedClient>,
    base_url: String,
}

impl MarketDataAggregator {
    pub fn new(client: Arc<RateLimitedClient>, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Header endpoint: spot price, change, volume, market cap.
    async fn fetch_header(&self, symbol: &str) -> Option<CompanySnapshot> {
        let url = format!("{}/{symbol}/header", self.base_url);
        let data = self.client.get_json(&url).await.ok()?;
        let header = data.get("data")?;

        Some(CompanySnapshot {
            symbol: header
                .get("symbol")
                .and_then(Value::as_str)
                .map(str::to_string),
            price_last: field_f64(header, "priceLast"),
            price_change: field_f64(header, "priceChange"),
            volume: field_i64(header, "volume"),
            market_cap: field_i64(header, "marketCap"),
            last_updated: Some(chrono::Utc::now().to_rfc3339()),
            ..CompanySnapshot::default()
        })
    }

    /// Key-statistics endpoint: average volume, share count, and the latest
    /// net income (income statements are ordered newest first).
    async fn fetch_key_stats(&self, symbol: &str) -> Option<CompanySnapshot> {
        let url = format!("{}/{symbol}/key-statistics", self.base_url);
        let data = self.client.get_json(&url).await.ok()?;
        let stats = data.get("data")?;

        let latest_income = stats
            .get("incomeStatement")
            .and_then(Value::as_array)
            .and_then(|statements| statements.first());

        Some(CompanySnapshot {
            volume_average: field_f64(stats, "volumeAverage"),
            num_of_shares: field_i64(stats, "numOfShares"),
            net_income: latest_income.and_then(|inc| field_f64(inc, "netIncome")),
            ..CompanySnapshot::default()
        })
    }

    /// Chart endpoint: the five-day volume series embedded as escaped SVG.
    async fn fetch_volumes(&self, symbol: &str) -> Vec<VolumePoint> {
        let url = format!(
            "{}/{symbol}/key-statistics-charts?height=270&width=250",
            self.base_url
        );
        let Ok(data) = self.client.get_json(&url).await else {
            return Vec::new();
        };
        let Some(svg) = data
            .get("data")
            .and_then(|d| d.get("fiveTradingVolume"))
            .and_then(Value::as_str)
        else {
            return Vec::new();
        };

        chart::extract_volume_points(svg)
    }
}

#[async_trait]
impl MarketData for MarketDataAggregator {
    async fn fetch_all(&self, symbol: &str) -> SymbolBundle {
        let mut snapshot = CompanySnapshot::default();

        match self.fetch_header(symbol).await {
            Some(header) => snapshot = header,
            None => warn!(symbol, "no header data"),
        }

        match self.fetch_key_stats(symbol).await {
            Some(stats) => {
                snapshot.volume_average = stats.volume_average;
                snapshot.num_of_shares = stats.num_of_shares;
                snapshot.net_income = stats.net_income;
            }
            None => warn!(symbol, "no key statistics data"),
        }

        let volumes = self.fetch_volumes(symbol).await;
        if volumes.is_empty() {
            warn!(symbol, "no volume chart data");
        }

        SymbolBundle { snapshot, volumes }
    }
}

fn field_f64(obj: &Value, key: &str) -> Option<f64> {
    obj.get(key).and_then(Value::as_f64)
}

fn field_i64(obj: &Value, key: &str) -> Option<i64> {
    let v = obj.get(key)?;
    v.as_i64().or_else(|| v.as_f64().map(|f| f as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_snapshot_emptiness_ignores_timestamp() {
        let snap = CompanySnapshot {
            last_updated: Some("2026-08-26T00:00:00Z".into()),
            ..CompanySnapshot::default()
        };
        assert!(snap.is_empty());

        let snap = CompanySnapshot {
            price_last: Some(1.23),
            ..CompanySnapshot::default()
        };
        assert!(!snap.is_empty());
    }

    #[test]
    fn test_numeric_field_coercion() {
        let obj = json!({"int": 5, "float": 5.9, "str": "5"});
        assert_eq!(field_i64(&obj, "int"), Some(5));
        assert_eq!(field_i64(&obj, "float"), Some(5));
        assert_eq!(field_i64(&obj, "str"), None);
        assert_eq!(field_f64(&obj, "int"), Some(5.0));
        assert_eq!(field_f64(&obj, "missing"), None);
    }
}
