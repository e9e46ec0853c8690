use chrono::Utc;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::gateway::PredictionGateway;
use crate::logging::{log, obj, v_num, v_str, Domain, Level};

use super::monitor::ConnectionMonitor;
use super::window::ActiveWindow;

/// Owns the repeating connectivity poll. The timer lives with the
/// service, never with a consumer. The ticker is recreated only when
/// the market window flips the derived cadence.
pub struct ConnectivityScheduler {
    handle: Option<JoinHandle<()>>,
}

impl ConnectivityScheduler {
    pub fn start(monitor: Arc<ConnectionMonitor>, window: ActiveWindow) -> Self {
        let handle = tokio::spawn(async move {
            let mut current = window.interval_at(Utc::now());
            let mut ticker = tokio::time::interval(current);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                // First tick of a fresh interval fires immediately, which
                // doubles as the startup check.
                ticker.tick().await;
                monitor.check(false).await;
                let want = window.interval_at(Utc::now());
                if want != current {
                    log(
                        Level::Info,
                        Domain::Poll,
                        "interval_changed",
                        obj(&[
                            ("from_ms", v_num(current.as_millis() as f64)),
                            ("to_ms", v_num(want.as_millis() as f64)),
                        ]),
                    );
                    current = want;
                    ticker = tokio::time::interval(current);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    // Swallow the immediate tick so the new cadence holds.
                    ticker.tick().await;
                }
            }
        });
        Self { handle: Some(handle) }
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for ConnectivityScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Slow background health poll. Failures are logged and dropped; health
/// detail is advisory, reachability is the monitor's job.
pub fn spawn_health_poll(gateway: Arc<dyn PredictionGateway>, every_secs: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(every_secs.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            log(
                Level::Debug,
                Domain::Connectivity,
                "health_check",
                obj(&[("status", v_str(crate::gateway::types::HealthState::Checking.as_str()))]),
            );
            match gateway.health().await {
                Ok(payload) => {
                    let metrics = payload.system.clone().unwrap_or_default();
                    log(
                        Level::Info,
                        Domain::Connectivity,
                        "health",
                        obj(&[
                            ("status", v_str(payload.state().as_str())),
                            ("cpu_pct", v_num(metrics.cpu_usage_percent.unwrap_or(0.0))),
                            ("mem_pct", v_num(metrics.memory_percent.unwrap_or(0.0))),
                            (
                                "models_trained",
                                v_num(
                                    payload
                                        .models
                                        .and_then(|m| m.total_trained)
                                        .unwrap_or(0) as f64,
                                ),
                            ),
                        ]),
                    );
                }
                Err(e) => {
                    log(
                        Level::Warn,
                        Domain::Connectivity,
                        "health_fetch_failed",
                        obj(&[("error", v_str(&e.to_string()))]),
                    );
                }
            }
        }
    })
}
