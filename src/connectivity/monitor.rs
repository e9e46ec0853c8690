use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::gateway::PredictionGateway;
use crate::logging::{log, obj, v_str, Domain, Level};

/// Read-only view of backend reachability handed to consumers.
#[derive(Debug, Clone)]
pub struct ConnectionSnapshot {
    pub is_connected: bool,
    pub is_checking: bool,
    pub error: Option<String>,
    pub last_check: Option<DateTime<Utc>>,
    pub backend_url: String,
}

struct MonitorState {
    is_connected: bool,
    is_checking: bool,
    error: Option<String>,
    last_check: Option<DateTime<Utc>>,
    // Monotonic twin of last_check, used for TTL gating.
    checked_at: Option<Instant>,
}

/// Owns the single process-wide connection state. Consumers get
/// snapshots; only `check` mutates. Constructed once at startup and
/// injectable wherever a scripted gateway is needed for tests.
pub struct ConnectionMonitor {
    gateway: Arc<dyn PredictionGateway>,
    state: Mutex<MonitorState>,
    backend_url: String,
    cache_ttl: Duration,
}

impl ConnectionMonitor {
    pub fn new(gateway: Arc<dyn PredictionGateway>, backend_url: String, cache_ttl: Duration) -> Self {
        Self {
            gateway,
            // Optimistic until the first probe lands.
            state: Mutex::new(MonitorState {
                is_connected: true,
                is_checking: false,
                error: None,
                last_check: None,
                checked_at: None,
            }),
            backend_url,
            cache_ttl,
        }
    }

    pub fn from_config(gateway: Arc<dyn PredictionGateway>, cfg: &Config) -> Self {
        Self::new(
            gateway,
            cfg.backend_url.clone(),
            Duration::from_secs(cfg.connection_ttl_secs),
        )
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        let st = self.state.lock().expect("monitor state poisoned");
        self.snapshot_of(&st)
    }

    /// Runs the reachability probe unless a check is already in flight
    /// or a cached result is younger than the TTL. `force` bypasses both
    /// guards. Never returns an error; every gateway failure becomes
    /// observable state with the original message preserved for display.
    pub async fn check(&self, force: bool) -> ConnectionSnapshot {
        {
            let mut st = self.state.lock().expect("monitor state poisoned");
            if st.is_checking && !force {
                return self.snapshot_of(&st);
            }
            if !force {
                if let Some(at) = st.checked_at {
                    if at.elapsed() < self.cache_ttl {
                        return self.snapshot_of(&st);
                    }
                }
            }
            st.is_checking = true;
            st.error = None;
        }

        let probe_result = self.gateway.probe().await;

        let mut st = self.state.lock().expect("monitor state poisoned");
        let was_connected = st.is_connected;
        st.is_checking = false;
        st.checked_at = Some(Instant::now());
        st.last_check = Some(Utc::now());
        match probe_result {
            Ok(()) => {
                st.is_connected = true;
                st.error = None;
            }
            Err(e) => {
                st.is_connected = false;
                st.error = Some(e.to_string());
            }
        }
        if st.is_connected != was_connected {
            log(
                Level::Info,
                Domain::Connectivity,
                "state_change",
                obj(&[
                    ("connected", serde_json::json!(st.is_connected)),
                    ("error", v_str(st.error.as_deref().unwrap_or(""))),
                    ("backend", v_str(&self.backend_url)),
                ]),
            );
        }
        self.snapshot_of(&st)
    }

    /// Manual retry path and restart/recovery flow.
    pub async fn force_check(&self) -> ConnectionSnapshot {
        self.check(true).await
    }

    fn snapshot_of(&self, st: &MonitorState) -> ConnectionSnapshot {
        ConnectionSnapshot {
            is_connected: st.is_connected,
            is_checking: st.is_checking,
            error: st.error.clone(),
            last_check: st.last_check,
            backend_url: self.backend_url.clone(),
        }
    }
}
