use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use uplinkfx::config::Config;
use uplinkfx::connectivity::gate::RefreshGate;
use uplinkfx::connectivity::monitor::ConnectionMonitor;
use uplinkfx::connectivity::scheduler::{spawn_health_poll, ConnectivityScheduler};
use uplinkfx::connectivity::window::ActiveWindow;
use uplinkfx::gateway::http::HttpGateway;
use uplinkfx::gateway::types::Horizon;
use uplinkfx::logging::{json_log, obj, v_num, v_str};
use uplinkfx::policy::client::{ResilientClient, TrainSettings};
use uplinkfx::policy::rate_limit::RateLimitGate;
use uplinkfx::policy::retry::RetryPolicy;
use uplinkfx::portfolio::store::HoldingsStore;
use uplinkfx::portfolio::sync::{PortfolioService, RefreshOutcome};

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();
    json_log(
        "system",
        obj(&[
            ("event", v_str("startup")),
            ("backend", v_str(&cfg.backend_url)),
            ("config_hash", v_str(&cfg.config_hash())),
        ]),
    );

    let gateway = Arc::new(HttpGateway::from_config(&cfg)?);
    let monitor = Arc::new(ConnectionMonitor::from_config(gateway.clone(), &cfg));
    let window = ActiveWindow::from_config(&cfg);
    let _scheduler = ConnectivityScheduler::start(monitor.clone(), window.clone());
    let _health = spawn_health_poll(gateway.clone(), cfg.health_poll_secs);

    let rate_gate = Arc::new(RateLimitGate::new(Duration::from_secs(cfg.rate_limit_cooldown_secs)));
    let client = Arc::new(ResilientClient::new(
        gateway.clone(),
        RetryPolicy::from_config(&cfg),
        rate_gate,
        TrainSettings::from_config(&cfg),
    ));

    let mut store = HoldingsStore::open(&cfg.sqlite_path)?;
    store.init()?;
    let portfolio = Arc::new(PortfolioService::new(client.clone(), store, &cfg));

    // Relay holdings change events into the log stream; in the full
    // application every mounted screen holds its own subscription.
    let mut events = portfolio.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            json_log("portfolio", obj(&[("event", v_str(&format!("{:?}", event)))]));
        }
    });

    // Dashboard stats loop: heavy screen, 60s floor between completed
    // fetches regardless of the poll cadence.
    {
        let client = client.clone();
        let monitor = monitor.clone();
        let window = window.clone();
        let symbols = cfg.dashboard_symbols.clone();
        let horizon = Horizon::parse(&cfg.default_horizon).unwrap_or(Horizon::Intraday);
        let cooldown = Duration::from_secs(cfg.dashboard_cooldown_secs);
        tokio::spawn(async move {
            let mut gate = RefreshGate::new(cooldown);
            loop {
                if monitor.snapshot().is_connected && gate.try_begin(false).is_ok() {
                    match client.predict(&symbols, horizon).await {
                        Ok(response) => {
                            json_log(
                                "dashboard",
                                obj(&[
                                    ("event", v_str("stats")),
                                    ("predictions", v_num(response.valid().count() as f64)),
                                ]),
                            );
                        }
                        Err(failure) => {
                            json_log(
                                "dashboard",
                                obj(&[
                                    ("event", v_str("stats_failed")),
                                    ("error", v_str(&failure.to_string())),
                                ]),
                            );
                        }
                    }
                    gate.complete();
                }
                sleep(window.interval_at(chrono::Utc::now())).await;
            }
        });
    }

    // Portfolio refresh loop at the slow cadence; the 1s floor inside
    // the service guards manual refreshes arriving in between.
    loop {
        match portfolio.refresh(false).await {
            Ok(RefreshOutcome::Refreshed(holdings)) => {
                let agg = uplinkfx::portfolio::holding::totals(&holdings);
                json_log(
                    "portfolio",
                    obj(&[
                        ("event", v_str("poll_refresh")),
                        ("holdings", v_num(holdings.len() as f64)),
                        ("total_value", v_num(agg.total_value)),
                        ("total_gain_pct", v_num(agg.total_gain_percent)),
                    ]),
                );
            }
            Ok(_) => {}
            Err(err) => {
                json_log(
                    "portfolio",
                    obj(&[("event", v_str("poll_refresh_failed")), ("error", v_str(&err.to_string()))]),
                );
            }
        }

        let snap = monitor.snapshot();
        json_log(
            "connectivity",
            obj(&[
                ("connected", serde_json::json!(snap.is_connected)),
                ("error", v_str(snap.error.as_deref().unwrap_or(""))),
            ]),
        );

        sleep(Duration::from_secs(cfg.portfolio_poll_secs)).await;
    }
}
