//! Scripted gateway used by the integration tests. Responses are queued
//! per endpoint; when a queue runs dry the gateway falls back to a
//! configured price table so long scenarios stay terse.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use uplinkfx::error::ApiFailure;
use uplinkfx::gateway::types::{
    AnalysisResponse, HealthPayload, Horizon, PredictMetadata, PredictResponse, Prediction,
    ScanResult, TrainRequest, TrainReport,
};
use uplinkfx::gateway::PredictionGateway;

pub fn ok_prediction(symbol: &str, price: f64) -> Prediction {
    Prediction {
        symbol: symbol.to_string(),
        current_price: Some(price),
        ..Default::default()
    }
}

pub fn missing_model(symbol: &str) -> Prediction {
    Prediction {
        symbol: symbol.to_string(),
        error: Some(format!("No trained model for {}", symbol)),
        ..Default::default()
    }
}

pub fn response_of(predictions: Vec<Prediction>) -> PredictResponse {
    PredictResponse {
        metadata: PredictMetadata::default(),
        predictions,
    }
}

pub struct ScriptedGateway {
    pub probe_calls: AtomicUsize,
    pub predict_calls: AtomicUsize,
    pub train_calls: AtomicUsize,
    pub scan_calls: AtomicUsize,
    pub last_predict_symbols: Mutex<Vec<String>>,
    probe_script: Mutex<VecDeque<Result<(), ApiFailure>>>,
    predict_script: Mutex<VecDeque<Result<PredictResponse, ApiFailure>>>,
    train_script: Mutex<VecDeque<Result<TrainReport, ApiFailure>>>,
    prices: Mutex<Vec<(String, f64)>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self {
            probe_calls: AtomicUsize::new(0),
            predict_calls: AtomicUsize::new(0),
            train_calls: AtomicUsize::new(0),
            scan_calls: AtomicUsize::new(0),
            last_predict_symbols: Mutex::new(Vec::new()),
            probe_script: Mutex::new(VecDeque::new()),
            predict_script: Mutex::new(VecDeque::new()),
            train_script: Mutex::new(VecDeque::new()),
            prices: Mutex::new(Vec::new()),
        }
    }

    pub fn with_prices(prices: &[(&str, f64)]) -> Self {
        let gw = Self::new();
        *gw.prices.lock().unwrap() = prices
            .iter()
            .map(|(s, p)| (s.to_string(), *p))
            .collect();
        gw
    }

    pub fn push_probe(&self, result: Result<(), ApiFailure>) {
        self.probe_script.lock().unwrap().push_back(result);
    }

    pub fn push_predict(&self, result: Result<PredictResponse, ApiFailure>) {
        self.predict_script.lock().unwrap().push_back(result);
    }

    pub fn push_train(&self, result: Result<TrainReport, ApiFailure>) {
        self.train_script.lock().unwrap().push_back(result);
    }
}

#[async_trait]
impl PredictionGateway for ScriptedGateway {
    async fn probe(&self) -> Result<(), ApiFailure> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        self.probe_script.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    async fn health(&self) -> Result<HealthPayload, ApiFailure> {
        Ok(HealthPayload {
            status: "healthy".into(),
            ..Default::default()
        })
    }

    async fn predict(&self, symbols: &[String], _horizon: Horizon) -> Result<PredictResponse, ApiFailure> {
        self.predict_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_predict_symbols.lock().unwrap() = symbols.to_vec();
        if let Some(scripted) = self.predict_script.lock().unwrap().pop_front() {
            return scripted;
        }
        let prices = self.prices.lock().unwrap();
        Ok(response_of(
            symbols
                .iter()
                .filter_map(|s| {
                    prices
                        .iter()
                        .find(|(sym, _)| sym == s)
                        .map(|(sym, price)| ok_prediction(sym, *price))
                })
                .collect(),
        ))
    }

    async fn analyze(&self, symbol: &str, _horizons: &[Horizon]) -> Result<AnalysisResponse, ApiFailure> {
        Ok(AnalysisResponse {
            symbol: symbol.to_string(),
            ..Default::default()
        })
    }

    async fn scan(
        &self,
        _symbols: &[String],
        _horizon: Horizon,
        _min_confidence: f64,
    ) -> Result<Vec<ScanResult>, ApiFailure> {
        self.scan_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Vec::new())
    }

    async fn train(&self, _req: TrainRequest) -> Result<TrainReport, ApiFailure> {
        self.train_calls.fetch_add(1, Ordering::SeqCst);
        self.train_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(TrainReport::default()))
    }
}
