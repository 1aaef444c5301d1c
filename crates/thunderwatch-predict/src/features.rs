//! The 15-feature input contract shared by the trained model and the
//! rule-based predictor.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thunderwatch_core::FeatureError;

/// Number of features in a [`FeatureVector`].
pub const FEATURE_COUNT: usize = 15;

/// Wire names, in the order the trained model expects them.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "wind_sfc_speed_ms",
    "wind_sfc_dir_deg",
    "wind_500_speed_ms",
    "wind_500_dir_deg",
    "temp_2m_C",
    "temp_500_C",
    "rh_2m_pct",
    "pressure_sfc_hPa",
    "precipitable_water_mm",
    "cloud_cover_frac",
    "cloud_top_temp_C",
    "CAPE_Jkg",
    "Lifted_Index_C",
    "K_index",
    "shear_850_500_ms",
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub wind_sfc_speed_ms: f64,
    pub wind_sfc_dir_deg: f64,
    pub wind_500_speed_ms: f64,
    pub wind_500_dir_deg: f64,
    #[serde(rename = "temp_2m_C")]
    pub temp_2m_c: f64,
    #[serde(rename = "temp_500_C")]
    pub temp_500_c: f64,
    pub rh_2m_pct: f64,
    #[serde(rename = "pressure_sfc_hPa")]
    pub pressure_sfc_hpa: f64,
    pub precipitable_water_mm: f64,
    pub cloud_cover_frac: f64,
    #[serde(rename = "cloud_top_temp_C")]
    pub cloud_top_temp_c: f64,
    #[serde(rename = "CAPE_Jkg")]
    pub cape_jkg: f64,
    #[serde(rename = "Lifted_Index_C")]
    pub lifted_index_c: f64,
    #[serde(rename = "K_index")]
    pub k_index: f64,
    pub shear_850_500_ms: f64,
}

impl FeatureVector {
    /// Strict parse of a request body: every field must be present and a
    /// finite number. Missing fields are all reported at once.
    pub fn from_json(value: &Value) -> Result<Self, FeatureError> {
        let object = value.as_object().ok_or(FeatureError::NotAnObject)?;

        let missing: Vec<String> = FEATURE_NAMES
            .iter()
            .filter(|name| !object.contains_key(**name))
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(FeatureError::Missing(missing));
        }

        let mut values = [0.0; FEATURE_COUNT];
        for (slot, name) in values.iter_mut().zip(FEATURE_NAMES) {
            *slot = object
                .get(name)
                .and_then(Value::as_f64)
                .filter(|v| v.is_finite())
                .ok_or_else(|| FeatureError::NotNumeric(name.to_string()))?;
        }

        Ok(Self::from_array(values))
    }

    pub fn from_array(values: [f64; FEATURE_COUNT]) -> Self {
        let [wind_sfc_speed_ms, wind_sfc_dir_deg, wind_500_speed_ms, wind_500_dir_deg, temp_2m_c, temp_500_c, rh_2m_pct, pressure_sfc_hpa, precipitable_water_mm, cloud_cover_frac, cloud_top_temp_c, cape_jkg, lifted_index_c, k_index, shear_850_500_ms] =
            values;
        Self {
            wind_sfc_speed_ms,
            wind_sfc_dir_deg,
            wind_500_speed_ms,
            wind_500_dir_deg,
            temp_2m_c,
            temp_500_c,
            rh_2m_pct,
            pressure_sfc_hpa,
            precipitable_water_mm,
            cloud_cover_frac,
            cloud_top_temp_c,
            cape_jkg,
            lifted_index_c,
            k_index,
            shear_850_500_ms,
        }
    }

    /// Values in [`FEATURE_NAMES`] order.
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.wind_sfc_speed_ms,
            self.wind_sfc_dir_deg,
            self.wind_500_speed_ms,
            self.wind_500_dir_deg,
            self.temp_2m_c,
            self.temp_500_c,
            self.rh_2m_pct,
            self.pressure_sfc_hpa,
            self.precipitable_water_mm,
            self.cloud_cover_frac,
            self.cloud_top_temp_c,
            self.cape_jkg,
            self.lifted_index_c,
            self.k_index,
            self.shear_850_500_ms,
        ]
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }

    /// Surface minus 500 hPa temperature.
    pub fn lapse(&self) -> f64 {
        self.temp_2m_c - self.temp_500_c
    }
}
