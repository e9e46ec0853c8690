//! Holdings synchronizer scenarios: batched refresh, the 1s cooldown,
//! fallback pricing on add, and change-event fanout.

mod common;

use common::ScriptedGateway;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use uplinkfx::config::Config;
use uplinkfx::error::ApiFailure;
use uplinkfx::policy::client::{ResilientClient, TrainSettings};
use uplinkfx::policy::rate_limit::RateLimitGate;
use uplinkfx::policy::retry::RetryPolicy;
use uplinkfx::portfolio::events::HoldingsEvent;
use uplinkfx::portfolio::holding::{totals, Holding, Side};
use uplinkfx::portfolio::store::HoldingsStore;
use uplinkfx::portfolio::sync::{PortfolioService, RefreshOutcome};

fn test_config() -> Config {
    Config::from_env()
}

fn service_with(
    gateway: Arc<ScriptedGateway>,
    seed: &[Holding],
) -> PortfolioService {
    let cfg = test_config();
    let client = Arc::new(ResilientClient::new(
        gateway,
        RetryPolicy { base_delay_ms: 1, ..Default::default() },
        Arc::new(RateLimitGate::new(Duration::from_secs(60))),
        TrainSettings {
            episodes: 5,
            retry_delay: Duration::from_millis(1),
            budget: 1,
        },
    ));
    let mut store = HoldingsStore::open_in_memory().unwrap();
    store.init().unwrap();
    if !seed.is_empty() {
        store.save(&cfg.default_portfolio, seed).unwrap();
    }
    PortfolioService::new(client, store, &cfg)
}

fn seed_two() -> Vec<Holding> {
    vec![
        Holding::new("AAPL", 2.0, 100.0, 100.0, None, Side::Long),
        Holding::new("MSFT", 1.0, 300.0, 300.0, None, Side::Long),
    ]
}

#[tokio::test]
async fn refresh_batches_prices_and_recomputes_values() {
    let gw = Arc::new(ScriptedGateway::with_prices(&[("AAPL", 110.0), ("MSFT", 290.0)]));
    let service = service_with(gw.clone(), &seed_two());

    let outcome = service.refresh(false).await.unwrap();
    let holdings = match outcome {
        RefreshOutcome::Refreshed(h) => h,
        other => panic!("expected refresh, got {:?}", other),
    };

    // One batched call for both symbols, never one call per symbol.
    assert_eq!(gw.predict_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        *gw.last_predict_symbols.lock().unwrap(),
        vec!["AAPL".to_string(), "MSFT".to_string()]
    );

    assert_eq!(holdings[0].value, 220.0);
    assert_eq!(holdings[1].value, 290.0);
    let agg = totals(&holdings);
    assert!((agg.total_gain - 10.0).abs() < 1e-9);
}

#[tokio::test]
async fn refresh_inside_cooldown_is_a_noop() {
    let gw = Arc::new(ScriptedGateway::with_prices(&[("AAPL", 110.0), ("MSFT", 290.0)]));
    let service = service_with(gw.clone(), &seed_two());

    assert!(matches!(service.refresh(false).await.unwrap(), RefreshOutcome::Refreshed(_)));
    // Within the 1s window: skipped, holdings unchanged, no network call.
    assert!(matches!(service.refresh(false).await.unwrap(), RefreshOutcome::SkippedCooldown));
    assert_eq!(gw.predict_calls.load(Ordering::SeqCst), 1);

    let holdings = service.holdings().unwrap();
    assert_eq!(holdings[0].value, 220.0);
}

#[tokio::test]
async fn manual_refresh_bypasses_cooldown() {
    let gw = Arc::new(ScriptedGateway::with_prices(&[("AAPL", 110.0), ("MSFT", 290.0)]));
    let service = service_with(gw.clone(), &seed_two());

    service.refresh(false).await.unwrap();
    assert!(matches!(service.refresh(true).await.unwrap(), RefreshOutcome::Refreshed(_)));
    assert_eq!(gw.predict_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn refresh_with_no_holdings_skips_the_network() {
    let gw = Arc::new(ScriptedGateway::new());
    let service = service_with(gw.clone(), &[]);
    assert!(matches!(service.refresh(false).await.unwrap(), RefreshOutcome::NoHoldings));
    assert_eq!(gw.predict_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn refresh_failure_surfaces_the_taxonomy() {
    let gw = Arc::new(ScriptedGateway::new());
    gw.push_predict(Err(ApiFailure::RateLimited));
    let service = service_with(gw.clone(), &seed_two());

    let err = service.refresh(false).await.unwrap_err();
    let failure = err.downcast_ref::<ApiFailure>().expect("typed failure");
    assert_eq!(*failure, ApiFailure::RateLimited);
    // Holdings keep their previous prices.
    assert_eq!(service.holdings().unwrap()[0].value, 200.0);
}

#[tokio::test]
async fn add_holding_uses_live_price_when_available() {
    let gw = Arc::new(ScriptedGateway::with_prices(&[("NVDA", 130.0)]));
    let service = service_with(gw.clone(), &[]);

    let added = service.add_holding("nvda", 3.0, 120.0, None, Side::Long).await.unwrap();
    assert_eq!(added.symbol, "NVDA");
    assert_eq!(added.current_price, 130.0);
    assert_eq!(added.value, 390.0);
    assert_eq!(service.holdings().unwrap().len(), 1);
}

#[tokio::test]
async fn add_holding_falls_back_to_entered_price_on_failure() {
    let gw = Arc::new(ScriptedGateway::new());
    gw.push_predict(Err(ApiFailure::NotConnected("connection refused".into())));
    gw.push_predict(Err(ApiFailure::NotConnected("connection refused".into())));
    gw.push_predict(Err(ApiFailure::NotConnected("connection refused".into())));
    let service = service_with(gw.clone(), &[]);
    let mut events = service.subscribe();

    // The add still lands, marked at the entered average price.
    let added = service.add_holding("AAPL", 2.0, 100.0, None, Side::Long).await.unwrap();
    assert_eq!(added.current_price, 100.0);
    assert_eq!(added.value, 200.0);

    let persisted = service.holdings().unwrap();
    assert_eq!(persisted.len(), 1);
    assert_eq!(persisted[0].value, 200.0);
    assert_eq!(
        events.recv().await.unwrap(),
        HoldingsEvent::Added { portfolio: "seed".into(), symbol: "AAPL".into() }
    );
}

#[tokio::test]
async fn add_into_existing_position_is_a_weighted_buy() {
    let gw = Arc::new(ScriptedGateway::with_prices(&[("AAPL", 120.0)]));
    let service = service_with(gw.clone(), &[Holding::new("AAPL", 2.0, 100.0, 100.0, None, Side::Long)]);

    let merged = service.add_holding("AAPL", 2.0, 120.0, None, Side::Long).await.unwrap();
    assert_eq!(merged.shares, 4.0);
    assert!((merged.avg_price - 110.0).abs() < 1e-9);
    assert_eq!(merged.value, 4.0 * 120.0);
    assert_eq!(service.holdings().unwrap().len(), 1, "merged, not duplicated");
}

#[tokio::test]
async fn partial_and_full_sells_keep_values_consistent() {
    let gw = Arc::new(ScriptedGateway::new());
    let service = service_with(gw, &[Holding::new("AAPL", 4.0, 100.0, 110.0, None, Side::Long)]);
    let mut events = service.subscribe();

    let remaining = service.sell_holding("AAPL", 1.0).unwrap().unwrap();
    assert_eq!(remaining.shares, 3.0);
    assert!((remaining.value - 330.0).abs() < 1e-9);
    assert_eq!(
        events.recv().await.unwrap(),
        HoldingsEvent::Updated { portfolio: "seed".into(), symbol: "AAPL".into() }
    );

    assert!(service.sell_holding("AAPL", 3.0).unwrap().is_none());
    assert!(service.holdings().unwrap().is_empty());
    assert_eq!(
        events.recv().await.unwrap(),
        HoldingsEvent::Removed { portfolio: "seed".into(), symbol: "AAPL".into() }
    );
}

#[tokio::test]
async fn remove_holding_persists_and_notifies() {
    let gw = Arc::new(ScriptedGateway::new());
    let service = service_with(gw, &seed_two());
    let mut events = service.subscribe();

    assert!(service.remove_holding("AAPL").unwrap());
    assert!(!service.remove_holding("AAPL").unwrap(), "second remove is a no-op");
    assert_eq!(service.holdings().unwrap().len(), 1);
    assert_eq!(
        events.recv().await.unwrap(),
        HoldingsEvent::Removed { portfolio: "seed".into(), symbol: "AAPL".into() }
    );
}

#[tokio::test]
async fn placeholder_rows_never_reach_the_batch_or_totals() {
    let gw = Arc::new(ScriptedGateway::with_prices(&[("AAPL", 110.0)]));
    let seed = vec![
        Holding::new("AAPL", 2.0, 100.0, 100.0, None, Side::Long),
        Holding::new("FAKE1", 1000.0, 1.0, 1_000.0, None, Side::Long),
        Holding::new("REL", 1.0, 90.0, 100.0, None, Side::Long),
    ];
    let service = service_with(gw.clone(), &seed);

    service.refresh(false).await.unwrap();
    // Only the real symbol went out in the batch.
    assert_eq!(*gw.last_predict_symbols.lock().unwrap(), vec!["AAPL".to_string()]);

    let agg = service.totals().unwrap();
    assert_eq!(agg.total_value, 220.0);
}

#[tokio::test]
async fn refresh_publishes_a_change_event() {
    let gw = Arc::new(ScriptedGateway::with_prices(&[("AAPL", 110.0), ("MSFT", 290.0)]));
    let service = service_with(gw, &seed_two());
    let mut events = service.subscribe();

    service.refresh(false).await.unwrap();
    assert_eq!(
        events.recv().await.unwrap(),
        HoldingsEvent::Refreshed { portfolio: "seed".into(), symbols: 2 }
    );
}

#[tokio::test]
async fn stop_loss_updates_are_persisted() {
    let gw = Arc::new(ScriptedGateway::new());
    let service = service_with(gw, &seed_two());

    assert!(service.update_stop_loss("AAPL", Some(95.0)).unwrap());
    assert_eq!(service.holdings().unwrap()[0].stop_loss_price, Some(95.0));
    assert!(!service.update_stop_loss("NVDA", Some(1.0)).unwrap());
}

#[tokio::test]
async fn portfolios_are_isolated_by_selection() {
    let gw = Arc::new(ScriptedGateway::new());
    let service = service_with(gw, &seed_two());

    service.select_portfolio("tree");
    assert!(service.holdings().unwrap().is_empty());
    service.select_portfolio("seed");
    assert_eq!(service.holdings().unwrap().len(), 2);
}
