use serde::{Deserialize, Serialize};

use crate::error::is_model_missing_text;

/// Prediction horizon accepted by predict/analyze/scan/train.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Horizon {
    Intraday,
    Short,
    Long,
}

impl Horizon {
    pub fn as_str(&self) -> &'static str {
        match self {
            Horizon::Intraday => "intraday",
            Horizon::Short => "short",
            Horizon::Long => "long",
        }
    }

    pub fn parse(s: &str) -> Option<Horizon> {
        match s.trim().to_ascii_lowercase().as_str() {
            "intraday" => Some(Horizon::Intraday),
            "short" => Some(Horizon::Short),
            "long" => Some(Horizon::Long),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PredictMetadata {
    #[serde(default)]
    pub count: Option<u32>,
    #[serde(default)]
    pub error: Option<String>,
}

/// One per-symbol prediction. The backend reports per-symbol failures
/// inline via `error` rather than failing the whole batch.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Prediction {
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default)]
    pub predicted_price: Option<f64>,
    #[serde(default)]
    pub predicted_return: Option<f64>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl Prediction {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn is_model_missing(&self) -> bool {
        self.error.as_deref().map(is_model_missing_text).unwrap_or(false)
    }

    /// Best usable price for marking a position: predicted first, then
    /// spot. Non-finite and non-positive values are rejected.
    pub fn effective_price(&self) -> Option<f64> {
        self.predicted_price
            .or(self.current_price)
            .filter(|p| p.is_finite() && *p > 0.0)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PredictResponse {
    #[serde(default)]
    pub metadata: PredictMetadata,
    #[serde(default)]
    pub predictions: Vec<Prediction>,
}

impl PredictResponse {
    pub fn valid(&self) -> impl Iterator<Item = &Prediction> {
        self.predictions.iter().filter(|p| p.is_ok())
    }

    /// First symbol whose prediction failed on a missing model, if any.
    pub fn first_missing_model(&self) -> Option<&str> {
        self.predictions
            .iter()
            .find(|p| p.is_model_missing())
            .map(|p| p.symbol.as_str())
    }

    pub fn price_for(&self, symbol: &str) -> Option<f64> {
        self.predictions
            .iter()
            .find(|p| p.symbol == symbol && p.is_ok())
            .and_then(|p| p.effective_price())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Healthy,
    Degraded,
    Error,
    Checking,
}

impl HealthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthState::Healthy => "healthy",
            HealthState::Degraded => "degraded",
            HealthState::Error => "error",
            HealthState::Checking => "checking",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SystemMetrics {
    #[serde(default)]
    pub cpu_usage_percent: Option<f64>,
    #[serde(default)]
    pub memory_percent: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelInventory {
    #[serde(default)]
    pub available: Option<bool>,
    #[serde(default)]
    pub total_trained: Option<u32>,
}

/// Health endpoint payload. Ephemeral, recomputed every fetch.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HealthPayload {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub system: Option<SystemMetrics>,
    #[serde(default)]
    pub models: Option<ModelInventory>,
}

impl HealthPayload {
    pub fn state(&self) -> HealthState {
        match self.status.as_str() {
            "healthy" => HealthState::Healthy,
            "degraded" => HealthState::Degraded,
            _ => HealthState::Error,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainRequest {
    pub symbol: String,
    pub horizon: Horizon,
    pub n_episodes: u32,
    pub force_retrain: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrainReport {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScanResult {
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub change_percent: Option<f64>,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// Per-horizon analysis detail is consumed by chart rendering, which is
/// outside this layer; the payload passes through untyped.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalysisResponse {
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub horizons: serde_json::Map<String, serde_json::Value>,
}
