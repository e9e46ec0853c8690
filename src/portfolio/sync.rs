use anyhow::{ensure, Result};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

use crate::config::Config;
use crate::connectivity::gate::{GateSkip, RefreshGate};
use crate::gateway::types::Horizon;
use crate::logging::{log, obj, v_num, v_str, Domain, Level};
use crate::policy::client::ResilientClient;

use super::events::{HoldingsBus, HoldingsEvent};
use super::holding::{sanitize, totals, Holding, PortfolioTotals, Side};
use super::store::HoldingsStore;

/// What a refresh call actually did.
#[derive(Debug)]
pub enum RefreshOutcome {
    Refreshed(Vec<Holding>),
    SkippedCooldown,
    SkippedInFlight,
    NoHoldings,
}

/// Owns the persisted holdings for the selected portfolio. All mutation
/// goes through this service; every write persists the full collection
/// and publishes a typed event so other consumers re-read the same
/// state.
pub struct PortfolioService {
    client: Arc<ResilientClient>,
    store: Mutex<HoldingsStore>,
    bus: HoldingsBus,
    gate: Mutex<RefreshGate>,
    portfolio: Mutex<String>,
    horizon: Horizon,
}

impl PortfolioService {
    pub fn new(client: Arc<ResilientClient>, store: HoldingsStore, cfg: &Config) -> Self {
        Self {
            client,
            store: Mutex::new(store),
            bus: HoldingsBus::new(64),
            gate: Mutex::new(RefreshGate::new(Duration::from_millis(cfg.portfolio_cooldown_ms))),
            portfolio: Mutex::new(cfg.default_portfolio.clone()),
            horizon: Horizon::parse(&cfg.default_horizon).unwrap_or(Horizon::Intraday),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HoldingsEvent> {
        self.bus.subscribe()
    }

    pub fn selected_portfolio(&self) -> String {
        self.portfolio.lock().expect("portfolio name poisoned").clone()
    }

    pub fn select_portfolio(&self, id: &str) {
        *self.portfolio.lock().expect("portfolio name poisoned") = id.to_string();
    }

    pub fn holdings(&self) -> Result<Vec<Holding>> {
        let name = self.selected_portfolio();
        let store = self.store.lock().expect("store poisoned");
        Ok(sanitize(store.load(&name)?))
    }

    pub fn totals(&self) -> Result<PortfolioTotals> {
        Ok(totals(&self.holdings()?))
    }

    /// Refreshes prices for every holding in one batched call. A refresh
    /// started inside the cooldown after the previous completed one is a
    /// no-op, and overlapping refreshes are rejected; a manual refresh
    /// bypasses only the cooldown.
    pub async fn refresh(&self, manual: bool) -> Result<RefreshOutcome> {
        {
            let mut gate = self.gate.lock().expect("refresh gate poisoned");
            match gate.try_begin(manual) {
                Err(GateSkip::InFlight) => {
                    log(
                        Level::Debug,
                        Domain::Portfolio,
                        "refresh_skipped",
                        obj(&[("reason", v_str("in_flight"))]),
                    );
                    return Ok(RefreshOutcome::SkippedInFlight);
                }
                Err(GateSkip::Cooldown) => {
                    log(
                        Level::Debug,
                        Domain::Portfolio,
                        "refresh_skipped",
                        obj(&[("reason", v_str("cooldown"))]),
                    );
                    return Ok(RefreshOutcome::SkippedCooldown);
                }
                Ok(()) => {}
            }
        }
        let result = self.refresh_inner().await;
        self.gate.lock().expect("refresh gate poisoned").complete();
        result
    }

    async fn refresh_inner(&self) -> Result<RefreshOutcome> {
        let name = self.selected_portfolio();
        let snapshot = {
            let store = self.store.lock().expect("store poisoned");
            sanitize(store.load(&name)?)
        };
        if snapshot.is_empty() {
            return Ok(RefreshOutcome::NoHoldings);
        }

        let symbols: Vec<String> = snapshot.iter().map(|h| h.symbol.clone()).collect();
        let response = self.client.predict(&symbols, self.horizon).await?;

        // Re-read under the lock before writing so an add or remove that
        // landed during the fetch is not overwritten.
        let updated = {
            let mut store = self.store.lock().expect("store poisoned");
            let mut current = sanitize(store.load(&name)?);
            for holding in current.iter_mut() {
                if let Some(price) = response.price_for(&holding.symbol) {
                    holding.reprice(price);
                }
            }
            store.save(&name, &current)?;
            current
        };

        let agg = totals(&updated);
        log(
            Level::Info,
            Domain::Portfolio,
            "refreshed",
            obj(&[
                ("portfolio", v_str(&name)),
                ("symbols", v_num(updated.len() as f64)),
                ("total_value", v_num(agg.total_value)),
                ("total_gain", v_num(agg.total_gain)),
            ]),
        );
        self.bus.publish(HoldingsEvent::Refreshed {
            portfolio: name,
            symbols: updated.len(),
        });
        Ok(RefreshOutcome::Refreshed(updated))
    }

    /// Adds a position, or buys into an existing one. The live price
    /// lookup is best-effort; on any failure the entered average price
    /// stands in, so an add never blocks on network success.
    pub async fn add_holding(
        &self,
        symbol: &str,
        shares: f64,
        avg_price: f64,
        stop_loss_price: Option<f64>,
        side: Side,
    ) -> Result<Holding> {
        ensure!(shares > 0.0, "shares must be positive");
        ensure!(avg_price > 0.0, "average price must be positive");
        let symbol = symbol.trim().to_ascii_uppercase();

        let price = match self.client.predict(&[symbol.clone()], self.horizon).await {
            Ok(response) => response.price_for(&symbol).unwrap_or(avg_price),
            Err(failure) => {
                log(
                    Level::Warn,
                    Domain::Portfolio,
                    "add_price_fallback",
                    obj(&[("symbol", v_str(&symbol)), ("error", v_str(&failure.to_string()))]),
                );
                avg_price
            }
        };

        let name = self.selected_portfolio();
        let added = {
            let mut store = self.store.lock().expect("store poisoned");
            let mut current = sanitize(store.load(&name)?);
            let holding = match current.iter_mut().find(|h| h.symbol == symbol) {
                Some(existing) => {
                    existing.buy(shares, price);
                    existing.clone()
                }
                None => {
                    let holding = Holding::new(symbol.clone(), shares, avg_price, price, stop_loss_price, side);
                    current.push(holding.clone());
                    holding
                }
            };
            store.save(&name, &current)?;
            holding
        };

        self.bus.publish(HoldingsEvent::Added {
            portfolio: name,
            symbol: added.symbol.clone(),
        });
        Ok(added)
    }

    /// Sells shares out of a position; a full sell removes the row.
    pub fn sell_holding(&self, symbol: &str, shares: f64) -> Result<Option<Holding>> {
        ensure!(shares > 0.0, "shares must be positive");
        let name = self.selected_portfolio();
        let (remaining, removed) = {
            let mut store = self.store.lock().expect("store poisoned");
            let mut current = sanitize(store.load(&name)?);
            let Some(pos) = current.iter().position(|h| h.symbol == symbol) else {
                return Ok(None);
            };
            let left = current[pos].sell(shares);
            let remaining = if left > 0.0 {
                Some(current[pos].clone())
            } else {
                current.remove(pos);
                None
            };
            store.save(&name, &current)?;
            (remaining, left <= 0.0)
        };
        self.bus.publish(if removed {
            HoldingsEvent::Removed { portfolio: name, symbol: symbol.to_string() }
        } else {
            HoldingsEvent::Updated { portfolio: name, symbol: symbol.to_string() }
        });
        Ok(remaining)
    }

    pub fn remove_holding(&self, symbol: &str) -> Result<bool> {
        let name = self.selected_portfolio();
        let removed = {
            let mut store = self.store.lock().expect("store poisoned");
            let mut current = sanitize(store.load(&name)?);
            let before = current.len();
            current.retain(|h| h.symbol != symbol);
            let removed = current.len() != before;
            if removed {
                store.save(&name, &current)?;
            }
            removed
        };
        if removed {
            self.bus.publish(HoldingsEvent::Removed {
                portfolio: name,
                symbol: symbol.to_string(),
            });
        }
        Ok(removed)
    }

    /// Single-symbol price patch, for push-style updates.
    pub fn update_price(&self, symbol: &str, price: f64) -> Result<bool> {
        ensure!(price.is_finite() && price > 0.0, "price must be positive");
        self.patch(symbol, |h| h.reprice(price))
    }

    pub fn update_stop_loss(&self, symbol: &str, stop_loss_price: Option<f64>) -> Result<bool> {
        self.patch(symbol, |h| h.stop_loss_price = stop_loss_price)
    }

    fn patch(&self, symbol: &str, apply: impl FnOnce(&mut Holding)) -> Result<bool> {
        let name = self.selected_portfolio();
        let patched = {
            let mut store = self.store.lock().expect("store poisoned");
            let mut current = sanitize(store.load(&name)?);
            let Some(holding) = current.iter_mut().find(|h| h.symbol == symbol) else {
                return Ok(false);
            };
            apply(holding);
            store.save(&name, &current)?;
            true
        };
        self.bus.publish(HoldingsEvent::Updated {
            portfolio: name,
            symbol: symbol.to_string(),
        });
        Ok(patched)
    }

    pub fn clear(&self) -> Result<()> {
        let name = self.selected_portfolio();
        self.store.lock().expect("store poisoned").clear(&name)?;
        self.bus.publish(HoldingsEvent::Cleared { portfolio: name });
        Ok(())
    }
}
