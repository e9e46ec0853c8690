use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl Default for Side {
    fn default() -> Self {
        Side::Long
    }
}

// Price written by early seed data into corrupted entries; paired with a
// truncated symbol it marks a row as synthetic.
const SENTINEL_PRICE: f64 = 100.0;

/// One persisted position. `value` is derived and must be recomputed on
/// every shares or price change; it is never trusted from storage alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holding {
    pub symbol: String,
    pub shares: f64,
    pub avg_price: f64,
    pub current_price: f64,
    pub value: f64,
    #[serde(default)]
    pub stop_loss_price: Option<f64>,
    #[serde(default)]
    pub side: Side,
}

impl Holding {
    pub fn new(
        symbol: impl Into<String>,
        shares: f64,
        avg_price: f64,
        current_price: f64,
        stop_loss_price: Option<f64>,
        side: Side,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            shares,
            avg_price,
            current_price,
            value: shares * current_price,
            stop_loss_price,
            side,
        }
    }

    pub fn reprice(&mut self, price: f64) {
        self.current_price = price;
        self.value = self.shares * price;
    }

    /// Adds shares at a price, recomputing the weighted average entry.
    pub fn buy(&mut self, shares: f64, price: f64) {
        let total_cost = self.avg_price * self.shares + price * shares;
        self.shares += shares;
        if self.shares > 0.0 {
            self.avg_price = total_cost / self.shares;
        }
        self.reprice(price);
    }

    /// Removes shares; returns the remaining count.
    pub fn sell(&mut self, shares: f64) -> f64 {
        self.shares = (self.shares - shares).max(0.0);
        self.value = self.shares * self.current_price;
        self.shares
    }

    pub fn gain(&self) -> f64 {
        (self.current_price - self.avg_price) * self.shares
    }

    /// Synthetic or malformed rows left behind by old seed data. These
    /// must never reach aggregates or refresh batches.
    pub fn is_placeholder(&self) -> bool {
        if self.symbol.is_empty() || self.symbol.starts_with("FAKE") || self.symbol.contains("TEST") {
            return true;
        }
        if self.current_price == SENTINEL_PRICE
            && matches!(self.symbol.as_str(), "RE" | "REL" | "RELIANCE")
        {
            return true;
        }
        !(self.shares > 0.0
            && self.avg_price > 0.0
            && self.current_price.is_finite()
            && self.current_price >= 0.0)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PortfolioTotals {
    pub total_value: f64,
    pub total_gain: f64,
    pub total_gain_percent: f64,
}

/// Drops placeholder rows; load paths call this before anything else
/// touches the collection.
pub fn sanitize(holdings: Vec<Holding>) -> Vec<Holding> {
    holdings.into_iter().filter(|h| !h.is_placeholder()).collect()
}

pub fn totals(holdings: &[Holding]) -> PortfolioTotals {
    let clean: Vec<&Holding> = holdings.iter().filter(|h| !h.is_placeholder()).collect();
    let total_value: f64 = clean.iter().map(|h| h.value).sum();
    let total_gain: f64 = clean.iter().map(|h| h.gain()).sum();
    PortfolioTotals {
        total_value,
        total_gain,
        total_gain_percent: if total_value > 0.0 {
            total_gain / total_value * 100.0
        } else {
            0.0
        },
    }
}
