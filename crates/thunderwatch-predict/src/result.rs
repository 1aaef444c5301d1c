//! Prediction output contract shared by the model and fallback paths.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use thunderwatch_weather::{RiskLevel, WeatherSnapshot};

/// Where a prediction came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Model,
    Fallback,
}

impl Provenance {
    pub fn as_str(self) -> &'static str {
        match self {
            Provenance::Model => "model",
            Provenance::Fallback => "fallback",
        }
    }
}

/// Probability band, the single source of truth for risk level and alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskBand {
    Extreme,
    Severe,
    Moderate,
    LowModerate,
    Low,
}

impl RiskBand {
    pub fn from_probability(probability: f64) -> Self {
        if probability >= 0.80 {
            Self::Extreme
        } else if probability >= 0.65 {
            Self::Severe
        } else if probability >= 0.45 {
            Self::Moderate
        } else if probability >= 0.25 {
            Self::LowModerate
        } else {
            Self::Low
        }
    }

    pub fn risk_level(self) -> RiskLevel {
        match self {
            Self::Extreme | Self::Severe => RiskLevel::Red,
            Self::Moderate | Self::LowModerate => RiskLevel::Yellow,
            Self::Low => RiskLevel::Green,
        }
    }

    pub fn alert(self, probability: f64) -> String {
        let pct = probability * 100.0;
        match self {
            Self::Extreme => format!(
                "EXTREME: {:.1}% thunderstorm probability - Take immediate action",
                pct
            ),
            Self::Severe => format!(
                "SEVERE: {:.1}% thunderstorm probability - Dangerous conditions",
                pct
            ),
            Self::Moderate => format!(
                "MODERATE: {:.1}% thunderstorm probability - Monitor closely",
                pct
            ),
            Self::LowModerate => format!("LOW-MODERATE: {:.1}% thunderstorm risk", pct),
            Self::Low => format!("LOW: {:.1}% thunderstorm risk - Conditions favorable", pct),
        }
    }
}

/// Round to three decimals.
pub(crate) fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    pub prediction: bool,
    pub probability: f64,
    pub confidence: f64,
    pub risk_level: RiskLevel,
    pub alert: String,
    pub factors: BTreeMap<String, String>,
    pub provenance: Provenance,
    pub model_version: String,
    pub model_type: String,
    pub fallback_reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl PredictionResult {
    /// Build a result whose risk level and alert follow from `probability`.
    pub fn from_probability(
        probability: f64,
        confidence: f64,
        provenance: Provenance,
        model_version: impl Into<String>,
        model_type: impl Into<String>,
    ) -> Self {
        let probability = round3(probability.clamp(0.0, 1.0));
        let band = RiskBand::from_probability(probability);
        Self {
            prediction: probability > 0.5,
            probability,
            confidence: confidence.clamp(0.0, 100.0),
            risk_level: band.risk_level(),
            alert: band.alert(probability),
            factors: BTreeMap::new(),
            provenance,
            model_version: model_version.into(),
            model_type: model_type.into(),
            fallback_reason: None,
            timestamp: Utc::now(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.provenance == Provenance::Fallback
    }
}

// Written by hand so both `risk_level` and `riskLevel` are emitted.
impl Serialize for PredictionResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("PredictionResult", 12)?;
        state.serialize_field("prediction", &u8::from(self.prediction))?;
        state.serialize_field("probability", &self.probability)?;
        state.serialize_field("confidence", &self.confidence)?;
        state.serialize_field("risk_level", &self.risk_level)?;
        state.serialize_field("riskLevel", &self.risk_level)?;
        state.serialize_field("alert", &self.alert)?;
        state.serialize_field("factors", &self.factors)?;
        state.serialize_field("provenance", &self.provenance)?;
        state.serialize_field("modelVersion", &self.model_version)?;
        state.serialize_field("modelType", &self.model_type)?;
        if let Some(reason) = &self.fallback_reason {
            state.serialize_field("fallbackReason", reason)?;
        } else {
            state.skip_field("fallbackReason")?;
        }
        state.serialize_field("timestamp", &self.timestamp)?;
        state.end()
    }
}

/// Prediction for one station together with the observations it used.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StationPrediction {
    #[serde(flatten)]
    pub prediction: PredictionResult,
    pub location_id: String,
    pub location_data: WeatherSnapshot,
}

/// Envelope returned to callers. Never carries model failures: those
/// surface only as `provenance = "fallback"` inside `data`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl<T> PredictionResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            location_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            location_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn station_failure(location_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            location_id: Some(location_id.into()),
            ..Self::rejected(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_edges() {
        assert_eq!(RiskBand::from_probability(0.80), RiskBand::Extreme);
        assert_eq!(RiskBand::from_probability(0.799), RiskBand::Severe);
        assert_eq!(RiskBand::from_probability(0.65), RiskBand::Severe);
        assert_eq!(RiskBand::from_probability(0.45), RiskBand::Moderate);
        assert_eq!(RiskBand::from_probability(0.25), RiskBand::LowModerate);
        assert_eq!(RiskBand::from_probability(0.249), RiskBand::Low);
    }

    #[test]
    fn test_band_levels() {
        assert_eq!(RiskBand::Severe.risk_level(), RiskLevel::Red);
        assert_eq!(RiskBand::LowModerate.risk_level(), RiskLevel::Yellow);
        assert_eq!(RiskBand::Low.risk_level(), RiskLevel::Green);
    }

    #[test]
    fn test_alert_interpolates_percentage() {
        assert_eq!(
            RiskBand::Extreme.alert(0.95),
            "EXTREME: 95.0% thunderstorm probability - Take immediate action"
        );
        assert_eq!(RiskBand::LowModerate.alert(0.3), "LOW-MODERATE: 30.0% thunderstorm risk");
    }

    #[test]
    fn test_from_probability_is_consistent() {
        let result = PredictionResult::from_probability(0.7123, 150.0, Provenance::Model, "1.0.0", "test");
        assert_eq!(result.probability, 0.712);
        assert_eq!(result.confidence, 100.0);
        assert_eq!(result.risk_level, RiskLevel::Red);
        assert!(result.prediction);
        assert!(result.alert.starts_with("SEVERE: 71.2%"));
    }

    #[test]
    fn test_serializes_both_risk_aliases() {
        let result = PredictionResult::from_probability(0.1, 90.0, Provenance::Fallback, "1.0.0", "test");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["risk_level"], "Green");
        assert_eq!(json["riskLevel"], "Green");
        assert_eq!(json["provenance"], "fallback");
        assert_eq!(json["prediction"], 0);
        assert!(json.get("fallbackReason").is_none());
    }

    #[test]
    fn test_station_failure_envelope() {
        let response: PredictionResponse<PredictionResult> =
            PredictionResponse::station_failure("nonexistent", "Location nonexistent not found");
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["locationId"], "nonexistent");
        assert_eq!(json["error"], "Location nonexistent not found");
        assert!(json.get("data").is_none());
    }
}
