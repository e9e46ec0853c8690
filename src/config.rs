use serde::Serialize;
use sha2::{Digest, Sha256};
use url::Url;

#[derive(Clone, Serialize)]
pub struct Config {
    pub backend_url: String,
    pub probe_timeout_ms: u64,
    pub inference_timeout_ms: u64,
    pub connection_ttl_secs: u64,
    pub fast_poll_ms: u64,
    pub slow_poll_ms: u64,
    pub health_poll_secs: u64,
    /// Market timezone as a fixed UTC offset in minutes (default IST).
    pub market_utc_offset_mins: i32,
    pub market_open_hour: u32,
    pub market_open_min: u32,
    pub market_close_hour: u32,
    pub market_close_min: u32,
    pub dashboard_cooldown_secs: u64,
    pub dashboard_symbols: Vec<String>,
    pub portfolio_cooldown_ms: u64,
    pub portfolio_poll_secs: u64,
    pub retry_max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub retry_jitter: f64,
    pub rate_limit_cooldown_secs: u64,
    pub train_episodes: u32,
    pub train_retry_delay_ms: u64,
    pub train_budget: u32,
    pub min_confidence: f64,
    pub default_horizon: String,
    pub default_portfolio: String,
    pub sqlite_path: String,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        // Normalize the backend URL up front so every module sees the
        // same base; a malformed override falls back to the default.
        let backend_url = std::env::var("BACKEND_URL")
            .ok()
            .and_then(|v| Url::parse(&v).ok())
            .map(|u| u.as_str().trim_end_matches('/').to_string())
            .unwrap_or_else(|| "http://127.0.0.1:8000".to_string());

        Self {
            backend_url,
            probe_timeout_ms: env_or("PROBE_TIMEOUT_MS", 2_000),
            inference_timeout_ms: env_or("INFERENCE_TIMEOUT_MS", 90_000),
            connection_ttl_secs: env_or("CONNECTION_TTL_SECS", 10),
            fast_poll_ms: env_or("FAST_POLL_MS", 5_000),
            slow_poll_ms: env_or("SLOW_POLL_MS", 30_000),
            health_poll_secs: env_or("HEALTH_POLL_SECS", 300),
            market_utc_offset_mins: env_or("MARKET_UTC_OFFSET_MINS", 330),
            market_open_hour: env_or("MARKET_OPEN_HOUR", 9),
            market_open_min: env_or("MARKET_OPEN_MIN", 15),
            market_close_hour: env_or("MARKET_CLOSE_HOUR", 15),
            market_close_min: env_or("MARKET_CLOSE_MIN", 30),
            dashboard_cooldown_secs: env_or("DASHBOARD_COOLDOWN_SECS", 60),
            dashboard_symbols: std::env::var("DASHBOARD_SYMBOLS")
                .unwrap_or_else(|_| "AAPL,GOOGL,MSFT".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            portfolio_cooldown_ms: env_or("PORTFOLIO_COOLDOWN_MS", 1_000),
            portfolio_poll_secs: env_or("PORTFOLIO_POLL_SECS", 120),
            retry_max_attempts: env_or("RETRY_MAX_ATTEMPTS", 3),
            retry_base_delay_ms: env_or("RETRY_BASE_DELAY_MS", 1_000),
            retry_max_delay_ms: env_or("RETRY_MAX_DELAY_MS", 30_000),
            retry_jitter: env_or("RETRY_JITTER", 0.0),
            rate_limit_cooldown_secs: env_or("RATE_LIMIT_COOLDOWN_SECS", 60),
            train_episodes: env_or("TRAIN_EPISODES", 10),
            train_retry_delay_ms: env_or("TRAIN_RETRY_DELAY_MS", 2_000),
            train_budget: env_or("TRAIN_BUDGET", 1),
            min_confidence: env_or("MIN_CONFIDENCE", 0.5),
            default_horizon: std::env::var("DEFAULT_HORIZON").unwrap_or_else(|_| "intraday".to_string()),
            default_portfolio: std::env::var("DEFAULT_PORTFOLIO").unwrap_or_else(|_| "seed".to_string()),
            sqlite_path: std::env::var("SQLITE_PATH").unwrap_or_else(|_| "./uplinkfx.sqlite".to_string()),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// SHA256 over the canonical JSON form, for run manifests and
    /// reproducibility checks.
    pub fn config_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.to_json().as_bytes());
        hex::encode(hasher.finalize())
    }
}
