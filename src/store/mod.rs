//! Record persistence: announcements, company snapshots, volume points.
//!
//! The orchestrator only sees the [`RecordStore`] trait; the default
//! implementation is a local SQLite database. New-item detection is
//! delegated here: inserting a batch returns only the announcements that
//! were not already known by document key.

use crate::error::Result;
use crate::feed::AnnouncementItem;
use crate::market::chart::VolumePoint;
use crate::market::CompanySnapshot;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

/// Idempotent persistence consumed by the orchestrator.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a batch of announcements; returns the subset actually new.
    /// Inserting the same batch twice yields an empty subset the second time.
    async fn insert_new_announcements(
        &self,
        items: &[AnnouncementItem],
    ) -> Result<Vec<AnnouncementItem>>;

    /// Insert or replace the snapshot for its symbol.
    async fn upsert_company_snapshot(&self, snapshot: &CompanySnapshot) -> Result<()>;

    /// Insert volume points, idempotent by (symbol, date).
    async fn insert_volume_points(&self, symbol: &str, points: &[VolumePoint]) -> Result<()>;
}

/// SQLite-backed record store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (creating if needed) the database and its schema.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        info!(path = %path.display(), "record store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS announcements (
                document_key TEXT PRIMARY KEY,
                symbol TEXT,
                headline TEXT,
                date TEXT,
                url TEXT,
                is_price_sensitive INTEGER
            );
            CREATE TABLE IF NOT EXISTS company_data (
                symbol TEXT PRIMARY KEY,
                price_last REAL,
                price_change REAL,
                volume INTEGER,
                market_cap INTEGER,
                volume_average REAL,
                num_of_shares INTEGER,
                net_income REAL,
                last_updated TEXT
            );
            CREATE TABLE IF NOT EXISTS five_day_volume (
                id INTEGER PRIMARY KEY,
                symbol TEXT,
                date TEXT,
                volume TEXT,
                UNIQUE(symbol, date)
            );
            CREATE INDEX IF NOT EXISTS idx_announcements_symbol ON announcements(symbol);
            CREATE INDEX IF NOT EXISTS idx_announcements_date ON announcements(date);
            CREATE INDEX IF NOT EXISTS idx_volumes_symbol ON five_day_volume(symbol);",
        )?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn insert_new_announcements(
        &self,
        items: &[AnnouncementItem],
    ) -> Result<Vec<AnnouncementItem>> {
        let conn = self.conn.lock().expect("store lock poisoned");
        let mut new_items = Vec::new();

        for item in items {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO announcements
                 (document_key, symbol, headline, date, url, is_price_sensitive)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    item.document_key,
                    item.symbol,
                    item.headline,
                    item.date,
                    item.url,
                    item.is_price_sensitive as i64,
                ],
            )?;
            if inserted > 0 {
                new_items.push(item.clone());
            }
        }

        debug!(total = items.len(), new = new_items.len(), "announcements saved");
        Ok(new_items)
    }

    async fn upsert_company_snapshot(&self, snapshot: &CompanySnapshot) -> Result<()> {
        let conn = self.conn.lock().expect("store lock poisoned");
        conn.execute(
            "INSERT INTO company_data
             (symbol, price_last, price_change, volume, market_cap,
              volume_average, num_of_shares, net_income, last_updated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(symbol) DO UPDATE SET
                price_last = excluded.price_last,
                price_change = excluded.price_change,
                volume = excluded.volume,
                market_cap = excluded.market_cap,
                volume_average = excluded.volume_average,
                num_of_shares = excluded.num_of_shares,
                net_income = excluded.net_income,
                last_updated = excluded.last_updated",
            params![
                snapshot.symbol,
                snapshot.price_last,
                snapshot.price_change,
                snapshot.volume,
                snapshot.market_cap,
                snapshot.volume_average,
                snapshot.num_of_shares,
                snapshot.net_income,
                snapshot.last_updated,
            ],
        )?;
        Ok(())
    }

    async fn insert_volume_points(&self, symbol: &str, points: &[VolumePoint]) -> Result<()> {
        let mut conn = self.conn.lock().expect("store lock poisoned");
        let tx = conn.transaction()?;
        for point in points {
            tx.execute(
                "INSERT OR IGNORE INTO five_day_volume (symbol, date, volume)
                 VALUES (?1, ?2, ?3)",
                params![symbol, point.date, point.volume],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}
