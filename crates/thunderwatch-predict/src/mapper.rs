//! Weather snapshot → model features.
//!
//! Surface fields map directly (wind converted from knots); upper-air and
//! convective fields the snapshot lacks are estimated from surface
//! temperature, humidity and wind.

use rand::Rng;
use thunderwatch_weather::{SharedRng, WeatherSnapshot};

use crate::features::FeatureVector;

pub const KNOTS_TO_MS: f64 = 0.514444;

#[derive(Debug, Default)]
pub struct ParameterMapper {
    rng: SharedRng,
}

impl ParameterMapper {
    pub fn new(rng: SharedRng) -> Self {
        Self { rng }
    }

    pub fn to_features(&self, snapshot: &WeatherSnapshot) -> FeatureVector {
        self.rng.with(|rng| to_features_with(snapshot, rng))
    }
}

/// Map a snapshot using `rng` for the estimated fields.
pub fn to_features_with<R: Rng + ?Sized>(snapshot: &WeatherSnapshot, rng: &mut R) -> FeatureVector {
    let w = &snapshot.weather;
    let t = &snapshot.thunderstorm_data;
    let temp = w.temperature;
    let humidity = w.humidity;
    let knots = w.wind_speed;

    let wind_500_dir_deg = (w.wind_direction + (rng.random::<f64>() - 0.5) * 60.0).rem_euclid(360.0);
    let temp_500_c = temp - (25.0 + rng.random::<f64>() * 15.0);

    let precipitable_water_mm = match t.precipitable_water {
        Some(v) => v,
        None => (humidity * 0.6 + rng.random::<f64>() * 20.0).max(5.0),
    };
    let cloud_top_temp_c = match t.cloud_top_temp {
        Some(v) => v,
        None => -20.0 - rng.random::<f64>() * 30.0,
    };
    let cape_jkg = match t.cape {
        Some(v) => v,
        None => estimate_cape(temp, humidity, rng.random()),
    };
    let lifted_index_c = match t.lifted_index {
        Some(v) => v,
        None => estimate_lifted_index(temp, humidity, rng.random()),
    };
    let k_index = match t.k_index {
        Some(v) => v,
        None => estimate_k_index(temp, humidity, rng.random()),
    };
    let shear_850_500_ms = match t.wind_shear {
        Some(v) => v,
        None => knots * 0.3 + rng.random::<f64>() * 15.0,
    };

    FeatureVector {
        wind_sfc_speed_ms: knots * KNOTS_TO_MS,
        wind_sfc_dir_deg: w.wind_direction,
        wind_500_speed_ms: knots * 1.5 * KNOTS_TO_MS,
        wind_500_dir_deg,
        temp_2m_c: temp,
        temp_500_c,
        rh_2m_pct: humidity,
        pressure_sfc_hpa: w.pressure,
        precipitable_water_mm,
        cloud_cover_frac: w.cloud_cover.unwrap_or(0.5),
        cloud_top_temp_c,
        cape_jkg,
        lifted_index_c,
        k_index,
        shear_850_500_ms,
    }
}

/// CAPE (J/kg) from surface temperature and humidity, `u` in `[0, 1)`.
pub fn estimate_cape(temp: f64, humidity: f64, u: f64) -> f64 {
    let base = ((temp - 10.0) * (humidity / 50.0)).max(0.0);
    (base * 100.0 + u * 1000.0).floor()
}

pub fn estimate_lifted_index(temp: f64, humidity: f64, u: f64) -> f64 {
    (25.0 - temp) / 4.0 + (50.0 - humidity) / 25.0 + (u - 0.5) * 4.0
}

pub fn estimate_k_index(temp: f64, humidity: f64, u: f64) -> f64 {
    (temp + humidity / 3.0 + u * 10.0).clamp(0.0, 50.0)
}
