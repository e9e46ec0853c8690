use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::holding::Holding;

/// Durable key-value store for holdings. One row per logical portfolio,
/// the whole collection JSON-serialized. Writers always replace the full
/// collection; the row is the serialization point between concurrent
/// screens.
pub struct HoldingsStore {
    conn: Connection,
}

/// User preference blob; shares the storage substrate but is outside the
/// resilience contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preferences {
    pub refresh_interval_secs: u64,
    pub default_horizon: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 120,
            default_horizon: "intraday".to_string(),
        }
    }
}

impl HoldingsStore {
    pub fn open(path: &str) -> Result<Self> {
        Ok(Self { conn: Connection::open(path)? })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self { conn: Connection::open_in_memory()? })
    }

    pub fn init(&mut self) -> Result<()> {
        self.conn.execute_batch(
            "BEGIN;
            CREATE TABLE IF NOT EXISTS holdings (
                portfolio TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                updated_ts INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS preferences (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                payload TEXT NOT NULL
            );
            COMMIT;",
        )?;
        Ok(())
    }

    pub fn load(&self, portfolio: &str) -> Result<Vec<Holding>> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload FROM holdings WHERE portfolio = ?1",
                params![portfolio],
                |row| row.get(0),
            )
            .optional()?;
        match payload {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    pub fn save(&mut self, portfolio: &str, holdings: &[Holding]) -> Result<()> {
        let payload = serde_json::to_string(holdings)?;
        self.conn.execute(
            "INSERT INTO holdings (portfolio, payload, updated_ts)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(portfolio) DO UPDATE SET payload = ?2, updated_ts = ?3",
            params![portfolio, payload, chrono::Utc::now().timestamp()],
        )?;
        Ok(())
    }

    pub fn clear(&mut self, portfolio: &str) -> Result<()> {
        self.conn.execute(
            "DELETE FROM holdings WHERE portfolio = ?1",
            params![portfolio],
        )?;
        Ok(())
    }

    pub fn load_preferences(&self) -> Result<Preferences> {
        let payload: Option<String> = self
            .conn
            .query_row("SELECT payload FROM preferences WHERE id = 1", [], |row| row.get(0))
            .optional()?;
        match payload {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Preferences::default()),
        }
    }

    pub fn save_preferences(&mut self, prefs: &Preferences) -> Result<()> {
        let payload = serde_json::to_string(prefs)?;
        self.conn.execute(
            "INSERT INTO preferences (id, payload) VALUES (1, ?1)
             ON CONFLICT(id) DO UPDATE SET payload = ?1",
            params![payload],
        )?;
        Ok(())
    }
}
