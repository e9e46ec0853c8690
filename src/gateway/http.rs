use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;

use crate::config::Config;
use crate::error::ApiFailure;

use super::types::{
    AnalysisResponse, HealthPayload, Horizon, PredictResponse, ScanResult, TrainRequest, TrainReport,
};
use super::PredictionGateway;

/// HTTP/JSON gateway to the prediction backend.
///
/// Two clients with different deadlines: a short one for the
/// reachability probe, a long one for inference, which routinely runs
/// 60-90s on cold model state. Exceeding the long deadline is a
/// `Timeout`, never `NotConnected`.
pub struct HttpGateway {
    client: Client,
    probe_client: Client,
    base: String,
    probe_timeout_ms: u64,
    inference_timeout_ms: u64,
}

impl HttpGateway {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(cfg.inference_timeout_ms))
            .build()?;
        let probe_client = Client::builder()
            .timeout(Duration::from_millis(cfg.probe_timeout_ms))
            .build()?;
        Ok(Self {
            client,
            probe_client,
            base: cfg.backend_url.clone(),
            probe_timeout_ms: cfg.probe_timeout_ms,
            inference_timeout_ms: cfg.inference_timeout_ms,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn map_transport(err: reqwest::Error, timeout_ms: u64) -> ApiFailure {
        if err.is_timeout() {
            ApiFailure::Timeout { timeout_ms }
        } else if err.is_connect() {
            ApiFailure::NotConnected(err.to_string())
        } else {
            ApiFailure::Unknown(err.to_string())
        }
    }

    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ApiFailure> {
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| ApiFailure::Unknown(format!("read body failed: {}", e)))?;
        if !status.is_success() {
            return Err(ApiFailure::from_status(status.as_u16(), &body));
        }
        serde_json::from_str(&body).map_err(|e| ApiFailure::Unknown(format!("decode failed: {}", e)))
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, ApiFailure> {
        let resp = self
            .client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::map_transport(e, self.inference_timeout_ms))?;
        Self::decode(resp).await
    }
}

#[async_trait]
impl PredictionGateway for HttpGateway {
    async fn probe(&self) -> Result<(), ApiFailure> {
        let resp = self
            .probe_client
            .get(self.url("/tools/health"))
            .send()
            .await
            .map_err(|e| Self::map_transport(e, self.probe_timeout_ms))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiFailure::from_status(status.as_u16(), &body));
        }
        Ok(())
    }

    async fn health(&self) -> Result<HealthPayload, ApiFailure> {
        let resp = self
            .client
            .get(self.url("/tools/health"))
            .send()
            .await
            .map_err(|e| Self::map_transport(e, self.inference_timeout_ms))?;
        Self::decode(resp).await
    }

    async fn predict(&self, symbols: &[String], horizon: Horizon) -> Result<PredictResponse, ApiFailure> {
        self.post_json(
            "/tools/predict",
            json!({ "symbols": symbols, "horizon": horizon.as_str() }),
        )
        .await
    }

    async fn analyze(&self, symbol: &str, horizons: &[Horizon]) -> Result<AnalysisResponse, ApiFailure> {
        let names: Vec<&str> = horizons.iter().map(|h| h.as_str()).collect();
        self.post_json(
            "/tools/analyze",
            json!({ "symbol": symbol, "horizons": names }),
        )
        .await
    }

    async fn scan(
        &self,
        symbols: &[String],
        horizon: Horizon,
        min_confidence: f64,
    ) -> Result<Vec<ScanResult>, ApiFailure> {
        #[derive(serde::Deserialize, Default)]
        struct ScanEnvelope {
            #[serde(default)]
            results: Vec<ScanResult>,
        }
        let envelope: ScanEnvelope = self
            .post_json(
                "/tools/scan_all",
                json!({
                    "symbols": symbols,
                    "horizon": horizon.as_str(),
                    "min_confidence": min_confidence,
                }),
            )
            .await?;
        Ok(envelope.results)
    }

    async fn train(&self, req: TrainRequest) -> Result<TrainReport, ApiFailure> {
        self.post_json(
            "/tools/train_rl",
            json!({
                "symbol": req.symbol,
                "horizon": req.horizon.as_str(),
                "n_episodes": req.n_episodes,
                "force_retrain": req.force_retrain,
            }),
        )
        .await
    }
}
