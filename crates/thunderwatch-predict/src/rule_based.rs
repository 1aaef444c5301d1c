//! Additive meteorological scoring used when the trained model is
//! unavailable.

use std::collections::BTreeMap;

use rand::Rng;
use thunderwatch_weather::SharedRng;

use crate::features::FeatureVector;
use crate::result::{PredictionResult, Provenance};

pub const FALLBACK_MODEL_TYPE: &str = "Enhanced Meteorological Model (Fallback)";

const MIN_PROBABILITY: f64 = 0.05;
const MAX_PROBABILITY: f64 = 0.95;
const PROBABILITY_JITTER: f64 = 0.03;

/// Raw score and the explanation of every signal that was evaluated.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskAssessment {
    pub score: f64,
    pub factors: BTreeMap<String, String>,
}

/// Score the features against the fixed threshold table. Pure.
pub fn assess(features: &FeatureVector) -> RiskAssessment {
    let mut score = 0.0;
    let mut factors = BTreeMap::new();

    let cape = features.cape_jkg;
    let (add, text) = if cape > 4000.0 {
        (0.40, format!("Extreme CAPE ({} J/kg) - Explosive potential", cape))
    } else if cape > 2500.0 {
        (0.30, format!("Very High CAPE ({} J/kg) - Strong storms likely", cape))
    } else if cape > 1000.0 {
        (0.20, format!("Moderate CAPE ({} J/kg) - Some potential", cape))
    } else {
        (0.0, format!("Low CAPE ({} J/kg) - Limited potential", cape))
    };
    score += add;
    factors.insert("cape".to_string(), text);

    let li = features.lifted_index_c;
    let (add, text) = if li < -8.0 {
        (0.30, format!("Extremely unstable (LI: {}°C)", li))
    } else if li < -6.0 {
        (0.25, format!("Very unstable (LI: {}°C)", li))
    } else if li < -4.0 {
        (0.20, format!("Unstable (LI: {}°C)", li))
    } else if li < -2.0 {
        (0.10, format!("Slightly unstable (LI: {}°C)", li))
    } else {
        (0.0, format!("Stable atmosphere (LI: {}°C)", li))
    };
    score += add;
    factors.insert("stability".to_string(), text);

    let shear = features.shear_850_500_ms;
    let (add, text) = if shear > 25.0 {
        (0.25, format!("Strong shear ({} m/s) - Supercell risk", shear))
    } else if shear > 20.0 {
        (0.20, format!("Moderate-strong shear ({} m/s)", shear))
    } else if shear > 15.0 {
        (0.15, format!("Moderate shear ({} m/s)", shear))
    } else {
        (0.0, format!("Light shear ({} m/s)", shear))
    };
    score += add;
    factors.insert("shear".to_string(), text);

    let rh = features.rh_2m_pct;
    if rh > 90.0 {
        score += 0.15;
        factors.insert("humidity".to_string(), format!("Very high humidity ({}%)", rh));
    } else if rh > 80.0 {
        score += 0.10;
        factors.insert("humidity".to_string(), format!("High humidity ({}%)", rh));
    }

    if features.pressure_sfc_hpa < 995.0 {
        score += 0.12;
        factors.insert(
            "pressure".to_string(),
            format!("Low pressure ({} hPa)", features.pressure_sfc_hpa),
        );
    }

    let lapse = features.lapse();
    if lapse > 35.0 {
        score += 0.15;
        factors.insert("lapse".to_string(), format!("Steep lapse rate ({:.1}°C)", lapse));
    }

    let k = features.k_index;
    if k > 40.0 {
        score += 0.15;
        factors.insert("kIndex".to_string(), format!("High K-Index ({})", k));
    } else if k > 30.0 {
        score += 0.10;
        factors.insert("kIndex".to_string(), format!("Moderate K-Index ({})", k));
    }

    RiskAssessment { score, factors }
}

/// Rule-based predictor. Deterministic apart from the two uniform draws for
/// probability jitter and confidence.
#[derive(Debug, Default)]
pub struct RuleBasedPredictor {
    rng: SharedRng,
    model_version: String,
}

impl RuleBasedPredictor {
    pub fn new(rng: SharedRng, model_version: impl Into<String>) -> Self {
        Self {
            rng,
            model_version: model_version.into(),
        }
    }

    pub fn model_version(&self) -> &str {
        &self.model_version
    }

    pub fn predict(&self, features: &FeatureVector) -> PredictionResult {
        self.rng.with(|rng| self.predict_with(features, rng))
    }

    pub fn predict_with<R: Rng + ?Sized>(
        &self,
        features: &FeatureVector,
        rng: &mut R,
    ) -> PredictionResult {
        debug_assert!(features.is_finite(), "non-finite features: {:?}", features);

        let assessment = assess(features);
        let jitter = (rng.random::<f64>() - 0.5) * PROBABILITY_JITTER;
        let probability = (assessment.score + jitter).clamp(MIN_PROBABILITY, MAX_PROBABILITY);
        let confidence = ((0.80 + rng.random::<f64>() * 0.15) * 100.0).floor();

        let mut result = PredictionResult::from_probability(
            probability,
            confidence,
            Provenance::Fallback,
            self.model_version.as_str(),
            FALLBACK_MODEL_TYPE,
        );
        result.factors = assessment.factors;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use thunderwatch_weather::RiskLevel;

    fn features(cape: f64, li: f64, shear: f64, rh: f64, pressure: f64, k: f64) -> FeatureVector {
        FeatureVector {
            wind_sfc_speed_ms: 5.0,
            wind_sfc_dir_deg: 180.0,
            wind_500_speed_ms: 10.0,
            wind_500_dir_deg: 190.0,
            temp_2m_c: 30.0,
            temp_500_c: 0.0,
            rh_2m_pct: rh,
            pressure_sfc_hpa: pressure,
            precipitable_water_mm: 40.0,
            cloud_cover_frac: 0.5,
            cloud_top_temp_c: -40.0,
            cape_jkg: cape,
            lifted_index_c: li,
            k_index: k,
            shear_850_500_ms: shear,
        }
    }

    fn severe() -> FeatureVector {
        features(4500.0, -9.0, 30.0, 95.0, 990.0, 45.0)
    }

    fn calm() -> FeatureVector {
        features(200.0, 3.0, 5.0, 40.0, 1020.0, 10.0)
    }

    /// Every signal firing: lapse 30 - (-10) = 40.
    fn storm_scenario() -> FeatureVector {
        FeatureVector {
            temp_500_c: -10.0,
            ..features(4500.0, -9.0, 30.0, 95.0, 980.0, 45.0)
        }
    }

    /// Nothing firing: lapse 30 - 20 = 10.
    fn fair_scenario() -> FeatureVector {
        FeatureVector {
            temp_500_c: 20.0,
            ..features(300.0, 3.0, 4.0, 40.0, 1020.0, 15.0)
        }
    }

    #[test]
    fn test_storm_scenario_is_red() {
        let assessment = assess(&storm_scenario());
        assert!((assessment.score - 1.52).abs() < 1e-9);
        assert_eq!(assessment.factors.len(), 7);
        assert_eq!(assessment.factors["pressure"], "Low pressure (980 hPa)");
        assert_eq!(assessment.factors["lapse"], "Steep lapse rate (40.0°C)");

        let predictor = RuleBasedPredictor::new(SharedRng::from_seed(11), "1.0.0");
        let mut rng = StdRng::seed_from_u64(12);
        for _ in 0..200 {
            let result = predictor.predict_with(&storm_scenario(), &mut rng);
            assert_eq!(result.probability, 0.95);
            assert_eq!(result.risk_level, RiskLevel::Red);
        }
    }

    #[test]
    fn test_fair_scenario_is_green() {
        let assessment = assess(&fair_scenario());
        assert_eq!(assessment.score, 0.0);
        assert_eq!(assessment.factors["shear"], "Light shear (4 m/s)");

        let predictor = RuleBasedPredictor::new(SharedRng::from_seed(13), "1.0.0");
        let mut rng = StdRng::seed_from_u64(14);
        for _ in 0..200 {
            let result = predictor.predict_with(&fair_scenario(), &mut rng);
            assert_eq!(result.probability, 0.05);
            assert_eq!(result.risk_level, RiskLevel::Green);
        }
    }

    #[test]
    fn test_assess_severe_sums_every_signal() {
        let assessment = assess(&severe());
        // 0.40 + 0.30 + 0.25 + 0.15 + 0.12 + 0.15 (k); lapse 30 adds nothing
        assert!((assessment.score - 1.37).abs() < 1e-9);
        for key in ["cape", "stability", "shear", "humidity", "pressure", "kIndex"] {
            assert!(assessment.factors.contains_key(key), "missing {}", key);
        }
        assert!(!assessment.factors.contains_key("lapse"));
    }

    #[test]
    fn test_assess_calm_only_reports_base_signals() {
        let assessment = assess(&calm());
        assert_eq!(assessment.score, 0.0);
        assert_eq!(assessment.factors.len(), 3);
        assert_eq!(
            assessment.factors["cape"],
            "Low CAPE (200 J/kg) - Limited potential"
        );
        assert_eq!(assessment.factors["stability"], "Stable atmosphere (LI: 3°C)");
    }

    #[test]
    fn test_steep_lapse() {
        let mut f = calm();
        f.temp_500_c = -10.0;
        let assessment = assess(&f);
        assert!((assessment.score - 0.15).abs() < 1e-9);
        assert_eq!(assessment.factors["lapse"], "Steep lapse rate (40.0°C)");
    }

    #[test]
    fn test_severe_is_red_and_capped() {
        let predictor = RuleBasedPredictor::new(SharedRng::from_seed(1), "1.0.0");
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let result = predictor.predict_with(&severe(), &mut rng);
            assert_eq!(result.probability, 0.95);
            assert_eq!(result.risk_level, RiskLevel::Red);
            assert!(result.alert.starts_with("EXTREME"));
            assert!(result.prediction);
            assert_eq!(result.provenance, Provenance::Fallback);
            assert_eq!(result.model_type, FALLBACK_MODEL_TYPE);
        }
    }

    #[test]
    fn test_calm_is_green_with_floor() {
        let predictor = RuleBasedPredictor::default();
        let mut rng = StdRng::seed_from_u64(8);
        for _ in 0..200 {
            let result = predictor.predict_with(&calm(), &mut rng);
            assert_eq!(result.probability, 0.05);
            assert_eq!(result.risk_level, RiskLevel::Green);
            assert!(!result.prediction);
        }
    }

    #[test]
    fn test_confidence_range() {
        let predictor = RuleBasedPredictor::default();
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..1_000 {
            let result = predictor.predict_with(&calm(), &mut rng);
            assert!((80.0..=94.0).contains(&result.confidence), "{}", result.confidence);
            assert_eq!(result.confidence.fract(), 0.0);
        }
    }

    #[test]
    fn test_probability_and_band_agree() {
        let predictor = RuleBasedPredictor::default();
        let mut rng = StdRng::seed_from_u64(10);
        // 0.20 + 0.10 + 0.15 = 0.45, jitter lands either side of the edge
        let f = features(1500.0, -3.0, 16.0, 50.0, 1010.0, 20.0);
        for _ in 0..500 {
            let result = predictor.predict_with(&f, &mut rng);
            assert!((0.435..=0.465).contains(&result.probability));
            assert_eq!(result.risk_level, RiskLevel::Yellow);
            assert_eq!(result.alert.starts_with("MODERATE"), result.probability >= 0.45);
        }
    }

    #[test]
    fn test_same_seed_same_result() {
        let predictor = RuleBasedPredictor::default();
        let a = predictor.predict_with(&severe(), &mut StdRng::seed_from_u64(3));
        let b = predictor.predict_with(&severe(), &mut StdRng::seed_from_u64(3));
        assert_eq!(a.probability, b.probability);
        assert_eq!(a.confidence, b.confidence);
    }
}
