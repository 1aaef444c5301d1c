//! Prediction orchestration: trained model first, rule-based fallback on
//! any model failure, one normalized result either way.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use thunderwatch_core::ModelError;
use thunderwatch_weather::{StationStore, WeatherSimulator};

use crate::bridge::{ExternalResult, ModelBridge, ModelStatus, MODEL_TYPE};
use crate::cache::PredictionCache;
use crate::features::FeatureVector;
use crate::mapper::ParameterMapper;
use crate::result::{PredictionResponse, PredictionResult, Provenance, RiskBand, StationPrediction};
use crate::rule_based::RuleBasedPredictor;
use crate::state::PredictionState;

pub const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_millis(15_000);

pub struct PredictionOrchestrator<B: ModelBridge> {
    bridge: B,
    fallback: RuleBasedPredictor,
    mapper: ParameterMapper,
    store: Arc<StationStore>,
    simulator: Arc<WeatherSimulator>,
    cache: Option<PredictionCache>,
    timeout: Duration,
    model_version: String,
}

impl<B: ModelBridge> PredictionOrchestrator<B> {
    pub fn new(
        bridge: B,
        fallback: RuleBasedPredictor,
        store: Arc<StationStore>,
        simulator: Arc<WeatherSimulator>,
    ) -> Self {
        let model_version = fallback.model_version().to_string();
        Self {
            bridge,
            fallback,
            mapper: ParameterMapper::default(),
            store,
            simulator,
            cache: None,
            timeout: DEFAULT_MODEL_TIMEOUT,
            model_version,
        }
    }

    pub fn with_mapper(mut self, mapper: ParameterMapper) -> Self {
        self.mapper = mapper;
        self
    }

    pub fn with_cache(mut self, cache: PredictionCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Deadline handed to every model invocation.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<StationStore> {
        &self.store
    }

    pub fn simulator(&self) -> &Arc<WeatherSimulator> {
        &self.simulator
    }

    pub fn cache(&self) -> Option<&PredictionCache> {
        self.cache.as_ref()
    }

    /// Predict from a validated feature vector. Never fails: model errors
    /// are logged and answered by the rule-based predictor.
    pub async fn predict(&self, features: &FeatureVector) -> PredictionResult {
        let state = PredictionState::default().on_invoke();

        let outcome = self
            .bridge
            .invoke(features, self.timeout)
            .await
            .and_then(|raw| self.normalize(raw));

        match outcome {
            Ok(result) => {
                let state = state.on_model_success();
                tracing::debug!(?state, probability = result.probability, "Model prediction");
                result
            }
            Err(err) => {
                tracing::warn!(
                    kind = err.kind(),
                    "Model prediction failed, using rule-based fallback: {}",
                    err
                );
                let state = state.on_model_failure();
                let mut result = self.fallback.predict(features);
                result.fallback_reason = Some(err.to_string());
                let state = state.on_fallback_done();
                tracing::debug!(?state, probability = result.probability, "Fallback prediction");
                result
            }
        }
    }

    /// Strict entry point for raw request bodies.
    pub async fn predict_json(&self, body: &Value) -> PredictionResponse<PredictionResult> {
        match FeatureVector::from_json(body) {
            Ok(features) => PredictionResponse::ok(self.predict(&features).await),
            Err(err) => {
                tracing::warn!("Rejected prediction request: {}", err);
                PredictionResponse::rejected(err.to_string())
            }
        }
    }

    /// Predict for a monitored station from a fresh snapshot, served from
    /// the cache while the last result is younger than its TTL.
    pub async fn predict_for_station(&self, station_id: &str) -> PredictionResponse<StationPrediction> {
        if let Some(hit) = self.cache.as_ref().and_then(|c| c.get(station_id)) {
            tracing::debug!("Prediction cache hit for {}", station_id);
            return PredictionResponse::ok(hit);
        }

        let station = match self.store.get(station_id) {
            Ok(station) => station,
            Err(err) => {
                tracing::warn!("Prediction failed for {}: {}", station_id, err);
                return PredictionResponse::station_failure(station_id, err.to_string());
            }
        };

        let snapshot = self.simulator.snapshot(&station);
        let features = self.mapper.to_features(&snapshot);
        let prediction = StationPrediction {
            prediction: self.predict(&features).await,
            location_id: station.id().to_string(),
            location_data: snapshot,
        };

        if let Some(cache) = &self.cache {
            cache.insert(station.id(), prediction.clone());
        }

        PredictionResponse::ok(prediction)
    }

    /// Predictions for every station, in store order.
    pub async fn predict_all(&self) -> Vec<PredictionResponse<StationPrediction>> {
        let mut responses = Vec::with_capacity(self.store.len());
        for station in self.store.list() {
            responses.push(self.predict_for_station(station.id()).await);
        }
        responses
    }

    pub async fn model_status(&self) -> ModelStatus {
        self.bridge.status().await
    }

    /// Map raw model output onto the shared contract. Risk level and alert
    /// always follow from the probability.
    fn normalize(&self, raw: ExternalResult) -> Result<PredictionResult, ModelError> {
        if !raw.probability.is_finite() {
            return Err(ModelError::MalformedOutput(format!(
                "probability is not a number: {}",
                raw.probability
            )));
        }
        let probability = raw.probability.clamp(0.0, 1.0);

        let confidence = match raw.confidence.filter(|c| c.is_finite()) {
            Some(c) if c <= 1.0 => c * 100.0,
            Some(c) => c,
            None => probability.max(1.0 - probability) * 100.0,
        };

        let mut result = PredictionResult::from_probability(
            probability,
            confidence,
            Provenance::Model,
            self.model_version.as_str(),
            MODEL_TYPE,
        );

        if let Some(flag) = raw.prediction_flag() {
            result.prediction = flag;
        }

        if let Some(reported) = raw.risk_level.as_deref() {
            if reported != result.risk_level.as_str() {
                tracing::debug!(
                    "Model reported risk {} for probability {}, using {}",
                    reported,
                    result.probability,
                    result.risk_level
                );
            }
        }

        if let Some(kind) = raw
            .model_info
            .as_ref()
            .and_then(|info| info.get("type"))
            .and_then(Value::as_str)
        {
            result.factors.insert("model".to_string(), kind.to_string());
        }

        debug_assert_eq!(
            RiskBand::from_probability(result.probability).risk_level(),
            result.risk_level
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;
    use thunderwatch_weather::{RiskLevel, SharedRng};

    use crate::features::FEATURE_NAMES;

    type Respond = Box<dyn Fn() -> Result<ExternalResult, ModelError> + Send + Sync>;

    struct FakeBridge {
        respond: Respond,
        calls: AtomicUsize,
    }

    impl FakeBridge {
        fn new(respond: impl Fn() -> Result<ExternalResult, ModelError> + Send + Sync + 'static) -> Self {
            Self {
                respond: Box::new(respond),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing(make: fn() -> ModelError) -> Self {
            Self::new(move || Err(make()))
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ModelBridge for FakeBridge {
        async fn invoke(
            &self,
            _features: &FeatureVector,
            _timeout: Duration,
        ) -> Result<ExternalResult, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.respond)()
        }
    }

    fn orchestrator(bridge: FakeBridge) -> PredictionOrchestrator<FakeBridge> {
        PredictionOrchestrator::new(
            bridge,
            RuleBasedPredictor::new(SharedRng::from_seed(11), "1.0.0"),
            Arc::new(StationStore::with_default_stations()),
            Arc::new(WeatherSimulator::new(SharedRng::from_seed(12), 0.05)),
        )
        .with_mapper(ParameterMapper::new(SharedRng::from_seed(13)))
    }

    fn severe_features() -> FeatureVector {
        FeatureVector {
            wind_sfc_speed_ms: 8.0,
            wind_sfc_dir_deg: 225.0,
            wind_500_speed_ms: 12.0,
            wind_500_dir_deg: 240.0,
            temp_2m_c: 35.0,
            temp_500_c: -5.0,
            rh_2m_pct: 92.0,
            pressure_sfc_hpa: 990.0,
            precipitable_water_mm: 55.0,
            cloud_cover_frac: 0.9,
            cloud_top_temp_c: -55.0,
            cape_jkg: 4200.0,
            lifted_index_c: -8.5,
            k_index: 42.0,
            shear_850_500_ms: 27.0,
        }
    }

    fn model_output(probability: f64, confidence: f64, risk: &str) -> ExternalResult {
        ExternalResult {
            prediction: Some(json!(1)),
            probability,
            confidence: Some(confidence),
            risk_level: Some(risk.to_string()),
            alert: Some("SEVERE".to_string()),
            model_info: Some(json!({"type": "Random Forest Classifier", "version": "1.0"})),
        }
    }

    #[tokio::test]
    async fn test_model_success_is_normalized() {
        // The model's own banding says Yellow; the canonical bands say Red.
        let orch = orchestrator(FakeBridge::new(|| Ok(model_output(0.7, 0.88, "Yellow"))));
        let result = orch.predict(&severe_features()).await;

        assert_eq!(result.provenance, Provenance::Model);
        assert_eq!(result.probability, 0.7);
        assert_eq!(result.risk_level, RiskLevel::Red);
        assert!(result.alert.starts_with("SEVERE: 70.0%"));
        assert!((result.confidence - 88.0).abs() < 1e-9);
        assert_eq!(result.model_type, MODEL_TYPE);
        assert_eq!(result.factors["model"], "Random Forest Classifier");
        assert!(result.fallback_reason.is_none());
    }

    #[tokio::test]
    async fn test_model_values_are_clamped() {
        let orch = orchestrator(FakeBridge::new(|| Ok(model_output(1.4, 250.0, "Red"))));
        let result = orch.predict(&severe_features()).await;
        assert_eq!(result.probability, 1.0);
        assert_eq!(result.confidence, 100.0);
    }

    #[tokio::test]
    async fn test_every_model_error_falls_back_once() {
        let failures: [fn() -> ModelError; 4] = [
            || ModelError::Unavailable("script missing".into()),
            || ModelError::Process {
                code: Some(1),
                stderr: "Traceback".into(),
            },
            || ModelError::MalformedOutput("empty output".into()),
            || ModelError::Timeout(Duration::from_millis(15_000)),
        ];

        for make in failures {
            let orch = orchestrator(FakeBridge::failing(make));
            let result = orch.predict(&severe_features()).await;

            assert_eq!(result.provenance, Provenance::Fallback);
            assert_eq!(result.risk_level, RiskLevel::Red);
            assert_eq!(result.fallback_reason.as_deref(), Some(make().to_string().as_str()));
            assert!(!result.factors.is_empty());
            assert_eq!(orch.bridge.calls(), 1, "no retries");
        }
    }

    #[tokio::test]
    async fn test_nan_probability_falls_back() {
        let orch = orchestrator(FakeBridge::new(|| Ok(model_output(f64::NAN, 90.0, "Red"))));
        let result = orch.predict(&severe_features()).await;
        assert_eq!(result.provenance, Provenance::Fallback);
        assert!(result.probability.is_finite());
    }

    #[tokio::test]
    async fn test_predict_json_lists_missing_fields() {
        let orch = orchestrator(FakeBridge::new(|| Ok(model_output(0.5, 80.0, "Yellow"))));
        let mut body = serde_json::to_value(severe_features()).unwrap();
        let map = body.as_object_mut().unwrap();
        map.remove("CAPE_Jkg");
        map.remove("K_index");

        let response = orch.predict_json(&body).await;
        assert!(!response.success);
        assert_eq!(
            response.error.as_deref(),
            Some("Missing required parameters: CAPE_Jkg, K_index")
        );
        assert_eq!(orch.bridge.calls(), 0);
    }

    #[tokio::test]
    async fn test_predict_json_accepts_complete_body() {
        let orch = orchestrator(FakeBridge::new(|| Ok(model_output(0.3, 70.0, "Yellow"))));
        let mut map = serde_json::Map::new();
        for name in FEATURE_NAMES {
            map.insert(name.to_string(), json!(1.0));
        }
        let response = orch.predict_json(&Value::Object(map)).await;
        assert!(response.success);
        let data = response.data.unwrap();
        assert_eq!(data.risk_level, RiskLevel::Yellow);
        assert_eq!(data.provenance, Provenance::Model);
    }

    #[tokio::test]
    async fn test_unknown_station() {
        let orch = orchestrator(FakeBridge::failing(|| ModelError::Unavailable("x".into())));
        let response = orch.predict_for_station("nonexistent").await;
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["locationId"], "nonexistent");
        assert!(json["error"].as_str().unwrap().contains("nonexistent"));
        assert_eq!(orch.bridge.calls(), 0);
    }

    #[tokio::test]
    async fn test_station_prediction_falls_back_to_rules() {
        let orch = orchestrator(FakeBridge::failing(|| ModelError::Unavailable("x".into())));

        let delhi = orch.predict_for_station("delhi").await.data.unwrap();
        assert_eq!(delhi.location_id, "delhi");
        assert_eq!(delhi.location_data.station_id, "delhi");
        assert_eq!(delhi.prediction.provenance, Provenance::Fallback);
        assert_eq!(delhi.prediction.risk_level, RiskLevel::Red);

        let tokyo = orch.predict_for_station("tokyo").await.data.unwrap();
        assert_eq!(tokyo.prediction.risk_level, RiskLevel::Green);

        let json = serde_json::to_value(&delhi).unwrap();
        assert_eq!(json["locationId"], "delhi");
        assert_eq!(json["provenance"], "fallback");
        assert_eq!(json["riskLevel"], json["risk_level"]);
        assert!(json["locationData"]["weather"].is_object());
    }

    #[tokio::test]
    async fn test_station_predictions_are_cached() {
        let orch = orchestrator(FakeBridge::new(|| Ok(model_output(0.9, 95.0, "Red"))))
            .with_cache(PredictionCache::new(Duration::from_secs(60)));

        let first = orch.predict_for_station("london").await.data.unwrap();
        let second = orch.predict_for_station("london").await.data.unwrap();
        assert_eq!(orch.bridge.calls(), 1);
        assert_eq!(first.prediction.timestamp, second.prediction.timestamp);
    }

    #[tokio::test]
    async fn test_predict_all_covers_every_station() {
        let orch = orchestrator(FakeBridge::new(|| Ok(model_output(0.2, 90.0, "Green"))));
        let responses = orch.predict_all().await;
        assert_eq!(responses.len(), 6);
        assert!(responses.iter().all(|r| r.success));
        assert_eq!(responses[0].data.as_ref().unwrap().location_id, "delhi");
    }

    #[tokio::test]
    async fn test_default_status_for_bridges_without_report() {
        let orch = orchestrator(FakeBridge::failing(|| ModelError::Unavailable("x".into())));
        let status = orch.model_status().await;
        assert!(!status.is_ready());
    }
}
