use chrono::{DateTime, Datelike, FixedOffset, Timelike, Utc, Weekday};
use std::time::Duration;

use crate::config::Config;

/// Trading-hours window in a fixed-offset market timezone. Inside the
/// window polling runs at the fast cadence, outside at the slow one.
/// Pure wall-clock arithmetic, no I/O.
#[derive(Debug, Clone)]
pub struct ActiveWindow {
    offset: FixedOffset,
    open_mins: u32,
    close_mins: u32,
    fast: Duration,
    slow: Duration,
}

impl ActiveWindow {
    pub fn new(
        utc_offset_mins: i32,
        open: (u32, u32),
        close: (u32, u32),
        fast: Duration,
        slow: Duration,
    ) -> Self {
        let offset = FixedOffset::east_opt(utc_offset_mins * 60)
            .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset is valid"));
        Self {
            offset,
            open_mins: open.0 * 60 + open.1,
            close_mins: close.0 * 60 + close.1,
            fast,
            slow,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(
            cfg.market_utc_offset_mins,
            (cfg.market_open_hour, cfg.market_open_min),
            (cfg.market_close_hour, cfg.market_close_min),
            Duration::from_millis(cfg.fast_poll_ms),
            Duration::from_millis(cfg.slow_poll_ms),
        )
    }

    /// Weekday and inside [open, close], both boundaries inclusive.
    pub fn is_active_at(&self, t: DateTime<Utc>) -> bool {
        let local = t.with_timezone(&self.offset);
        let weekday = !matches!(local.weekday(), Weekday::Sat | Weekday::Sun);
        let mins = local.hour() * 60 + local.minute();
        weekday && mins >= self.open_mins && mins <= self.close_mins
    }

    pub fn interval_at(&self, t: DateTime<Utc>) -> Duration {
        if self.is_active_at(t) {
            self.fast
        } else {
            self.slow
        }
    }
}
