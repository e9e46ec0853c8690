pub mod http;
pub mod types;

use async_trait::async_trait;

use crate::error::ApiFailure;
use types::{AnalysisResponse, HealthPayload, Horizon, PredictResponse, ScanResult, TrainRequest, TrainReport};

/// Seam between the resilience layer and the remote prediction service.
/// Everything above this trait is deterministic and testable against a
/// scripted implementation.
#[async_trait]
pub trait PredictionGateway: Send + Sync {
    /// Lightweight reachability probe with a short deadline. Success
    /// means only "the backend answered"; health detail comes from
    /// `health`.
    async fn probe(&self) -> Result<(), ApiFailure>;

    async fn health(&self) -> Result<HealthPayload, ApiFailure>;

    /// Batched prediction for a set of symbols at one horizon.
    async fn predict(&self, symbols: &[String], horizon: Horizon) -> Result<PredictResponse, ApiFailure>;

    async fn analyze(&self, symbol: &str, horizons: &[Horizon]) -> Result<AnalysisResponse, ApiFailure>;

    async fn scan(
        &self,
        symbols: &[String],
        horizon: Horizon,
        min_confidence: f64,
    ) -> Result<Vec<ScanResult>, ApiFailure>;

    /// Long-running model training. Not idempotent; never retried
    /// automatically by the request policy.
    async fn train(&self, req: TrainRequest) -> Result<TrainReport, ApiFailure>;
}
