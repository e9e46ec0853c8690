use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::time::{sleep, Duration};

use crate::config::Config;
use crate::error::ApiFailure;
use crate::gateway::types::{
    AnalysisResponse, Horizon, PredictResponse, ScanResult, TrainRequest,
};
use crate::gateway::PredictionGateway;
use crate::logging::{log, obj, v_num, v_str, Domain, Level};

use super::rate_limit::RateLimitGate;
use super::retry::{retry_read, RetryPolicy};

/// A retry scheduled because a prediction reported a missing model.
/// Created when the auto-train kicks off, destroyed when the follow-up
/// predict resolves either way.
#[derive(Debug, Clone)]
pub struct PendingTrainRetry {
    pub symbol: String,
    pub scheduled_at: DateTime<Utc>,
    pub attempt: u32,
}

/// Knobs for the auto-train recovery loop.
#[derive(Debug, Clone)]
pub struct TrainSettings {
    pub episodes: u32,
    /// Delay between training completion and the re-issued read.
    pub retry_delay: Duration,
    /// Auto-train attempts allowed per symbol before the caller is told
    /// to train manually.
    pub budget: u32,
}

impl TrainSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            episodes: cfg.train_episodes,
            retry_delay: Duration::from_millis(cfg.train_retry_delay_ms),
            budget: cfg.train_budget.max(1),
        }
    }
}

/// Uniform request policy for every data-fetching call site: backoff for
/// idempotent reads, shared rate-limit cooldown, and the
/// train-then-retry recovery for predictions that fail on a missing
/// model.
pub struct ResilientClient {
    gateway: Arc<dyn PredictionGateway>,
    retry: RetryPolicy,
    rate_gate: Arc<RateLimitGate>,
    settings: TrainSettings,
    // Auto-train budget spent per symbol; cleared when a recovery lands.
    train_attempts: Mutex<HashMap<String, u32>>,
    pending: Mutex<HashMap<String, PendingTrainRetry>>,
}

impl ResilientClient {
    pub fn new(
        gateway: Arc<dyn PredictionGateway>,
        retry: RetryPolicy,
        rate_gate: Arc<RateLimitGate>,
        settings: TrainSettings,
    ) -> Self {
        Self {
            gateway,
            retry,
            rate_gate,
            settings,
            train_attempts: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Retries currently waiting on a training run, for display.
    pub fn pending_retries(&self) -> Vec<PendingTrainRetry> {
        self.pending
            .lock()
            .expect("pending map poisoned")
            .values()
            .cloned()
            .collect()
    }

    /// Batched prediction with full recovery semantics. A missing-model
    /// response triggers at most one background training run for that
    /// symbol (within the per-symbol budget), then exactly one re-issued
    /// read. Never loops.
    pub async fn predict(
        &self,
        symbols: &[String],
        horizon: Horizon,
    ) -> Result<PredictResponse, ApiFailure> {
        self.rate_gate.check()?;
        let response = retry_read(&self.retry, "predict", || {
            self.gateway.predict(symbols, horizon)
        })
        .await
        .map_err(|e| {
            self.rate_gate.observe(&e);
            e
        })?;

        let symbol = match response.first_missing_model() {
            None => return Ok(response),
            Some(s) => s.to_string(),
        };
        self.recover_missing_model(symbols, horizon, symbol).await
    }

    async fn recover_missing_model(
        &self,
        symbols: &[String],
        horizon: Horizon,
        symbol: String,
    ) -> Result<PredictResponse, ApiFailure> {
        // A rate-limited backend gets no training call at all; the user
        // waits out the cooldown and retries manually.
        if self.rate_gate.check().is_err() {
            return Err(ApiFailure::RateLimited);
        }

        let attempt = {
            let mut spent = self.train_attempts.lock().expect("attempts map poisoned");
            let entry = spent.entry(symbol.clone()).or_insert(0);
            if *entry >= self.settings.budget {
                return Err(ApiFailure::ModelMissing { symbol });
            }
            *entry += 1;
            *entry
        };

        self.pending.lock().expect("pending map poisoned").insert(
            symbol.clone(),
            PendingTrainRetry {
                symbol: symbol.clone(),
                scheduled_at: Utc::now(),
                attempt,
            },
        );
        log(
            Level::Info,
            Domain::Train,
            "auto_train_start",
            obj(&[
                ("symbol", v_str(&symbol)),
                ("attempt", v_num(attempt as f64)),
                ("episodes", v_num(self.settings.episodes as f64)),
            ]),
        );

        let trained = self
            .gateway
            .train(TrainRequest {
                symbol: symbol.clone(),
                horizon,
                n_episodes: self.settings.episodes,
                force_retrain: false,
            })
            .await;

        if let Err(failure) = trained {
            self.pending.lock().expect("pending map poisoned").remove(&symbol);
            self.rate_gate.observe(&failure);
            log(
                Level::Warn,
                Domain::Train,
                "auto_train_failed",
                obj(&[("symbol", v_str(&symbol)), ("error", v_str(&failure.to_string()))]),
            );
            // Timeout propagates as still-processing; the caller's next
            // scheduled tick is the retry path.
            return Err(failure);
        }

        sleep(self.settings.retry_delay).await;

        // One re-issued read, no backoff loop on top of a recovery.
        let again = self.gateway.predict(symbols, horizon).await;
        self.pending.lock().expect("pending map poisoned").remove(&symbol);
        let again = again.map_err(|e| {
            self.rate_gate.observe(&e);
            e
        })?;

        if let Some(still) = again.first_missing_model() {
            return Err(ApiFailure::ModelMissing {
                symbol: still.to_string(),
            });
        }
        // Model exists now; allow future auto-trains if it regresses.
        self.train_attempts
            .lock()
            .expect("attempts map poisoned")
            .remove(&symbol);
        log(
            Level::Info,
            Domain::Train,
            "auto_train_recovered",
            obj(&[("symbol", v_str(&symbol))]),
        );
        Ok(again)
    }

    pub async fn analyze(
        &self,
        symbol: &str,
        horizons: &[Horizon],
    ) -> Result<AnalysisResponse, ApiFailure> {
        self.rate_gate.check()?;
        retry_read(&self.retry, "analyze", || self.gateway.analyze(symbol, horizons))
            .await
            .map_err(|e| {
                self.rate_gate.observe(&e);
                e
            })
    }

    pub async fn scan(
        &self,
        symbols: &[String],
        horizon: Horizon,
        min_confidence: f64,
    ) -> Result<Vec<ScanResult>, ApiFailure> {
        self.rate_gate.check()?;
        retry_read(&self.retry, "scan", || {
            self.gateway.scan(symbols, horizon, min_confidence)
        })
        .await
        .map_err(|e| {
            self.rate_gate.observe(&e);
            e
        })
    }

    /// User-initiated training. Not idempotent, so no backoff; the rate
    /// gate still applies in both directions.
    pub async fn train(&self, req: TrainRequest) -> Result<crate::gateway::types::TrainReport, ApiFailure> {
        self.rate_gate.check()?;
        self.gateway.train(req).await.map_err(|e| {
            self.rate_gate.observe(&e);
            e
        })
    }
}
