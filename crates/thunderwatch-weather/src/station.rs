//! Monitored stations and their baseline observations.
//!
//! The station list is fixed at startup. The only mutable field is the risk
//! category, held in an atomic cell so the drift task can replace it while
//! any number of readers take snapshots.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thunderwatch_core::{ConfigError, WeatherError};

use crate::types::{Coordinates, RiskLevel};

/// Baseline observations a station's snapshots are derived from.
/// Wind speed is in knots.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Baseline {
    pub status: String,
    pub confidence: u8,
    pub wind_speed: f64,
    pub wind_direction: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub cape: f64,
    pub lifted_index: f64,
    pub k_index: f64,
    pub wind_shear: f64,
    pub alert: Option<String>,
}

#[derive(Debug)]
pub struct Station {
    id: String,
    name: String,
    country: String,
    coordinates: Coordinates,
    baseline: Baseline,
    risk: AtomicU8,
}

impl Station {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        country: impl Into<String>,
        coordinates: Coordinates,
        risk: RiskLevel,
        baseline: Baseline,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            country: country.into(),
            coordinates,
            baseline,
            risk: AtomicU8::new(risk.to_u8()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    pub fn coordinates(&self) -> Coordinates {
        self.coordinates
    }

    pub fn baseline(&self) -> &Baseline {
        &self.baseline
    }

    /// Current risk category. A single atomic load, so callers see either
    /// the value before or after a concurrent drift, never a mix.
    pub fn risk(&self) -> RiskLevel {
        RiskLevel::from_u8(self.risk.load(Ordering::Acquire))
    }

    pub fn set_risk(&self, risk: RiskLevel) {
        self.risk.store(risk.to_u8(), Ordering::Release);
    }

    /// Atomically replace the risk with `f(current)`. Returns `(old, new)`.
    pub fn update_risk(&self, f: impl Fn(RiskLevel) -> RiskLevel) -> (RiskLevel, RiskLevel) {
        let previous = self
            .risk
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                Some(f(RiskLevel::from_u8(raw)).to_u8())
            })
            .unwrap_or_else(|raw| raw);
        let old = RiskLevel::from_u8(previous);
        (old, f(old))
    }

    /// Serializable view with the risk category read now.
    pub fn info(&self) -> StationInfo {
        StationInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            country: self.country.clone(),
            coordinates: self.coordinates,
            risk: self.risk(),
            baseline: self.baseline.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationInfo {
    pub id: String,
    pub name: String,
    pub country: String,
    pub coordinates: Coordinates,
    pub risk: RiskLevel,
    #[serde(flatten)]
    pub baseline: Baseline,
}

/// Ordered, append-never set of monitored stations.
#[derive(Debug)]
pub struct StationStore {
    stations: Vec<Arc<Station>>,
    index: HashMap<String, usize>,
}

impl StationStore {
    /// Build a store from a station list. Identifiers must be unique.
    pub fn new(stations: Vec<Station>) -> Result<Self, ConfigError> {
        let mut index = HashMap::with_capacity(stations.len());
        for (i, station) in stations.iter().enumerate() {
            if index.insert(station.id.clone(), i).is_some() {
                return Err(ConfigError::Invalid(format!(
                    "duplicate station id '{}'",
                    station.id
                )));
            }
        }

        Ok(Self {
            stations: stations.into_iter().map(Arc::new).collect(),
            index,
        })
    }

    pub fn with_default_stations() -> Self {
        let stations = default_stations();
        let index = stations
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.clone(), i))
            .collect();
        Self {
            stations: stations.into_iter().map(Arc::new).collect(),
            index,
        }
    }

    /// Look up a station by identifier.
    pub fn get(&self, id: &str) -> Result<Arc<Station>, WeatherError> {
        self.index
            .get(id)
            .map(|&i| Arc::clone(&self.stations[i]))
            .ok_or_else(|| WeatherError::StationNotFound(id.to_string()))
    }

    /// All stations in insertion order.
    pub fn list(&self) -> &[Arc<Station>] {
        &self.stations
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}

impl Default for StationStore {
    fn default() -> Self {
        Self::with_default_stations()
    }
}

fn seed(
    id: &str,
    name: &str,
    country: &str,
    (lat, lng): (f64, f64),
    risk: RiskLevel,
    status: &str,
    confidence: u8,
    wind: (f64, f64),
    temperature: f64,
    humidity: f64,
    pressure: f64,
    indices: (f64, f64, f64, f64),
    alert: Option<&str>,
) -> Station {
    let (cape, lifted_index, k_index, wind_shear) = indices;
    Station::new(
        id,
        name,
        country,
        Coordinates { lat, lng },
        risk,
        Baseline {
            status: status.to_string(),
            confidence,
            wind_speed: wind.0,
            wind_direction: wind.1,
            temperature,
            humidity,
            pressure,
            cape,
            lifted_index,
            k_index,
            wind_shear,
            alert: alert.map(str::to_string),
        },
    )
}

/// The six monitored airports.
pub fn default_stations() -> Vec<Station> {
    vec![
        seed(
            "delhi",
            "Delhi",
            "India",
            (28.7041, 77.1025),
            RiskLevel::Red,
            "Severe thunderstorm warning",
            88,
            (15.5, 225.0),
            35.2,
            78.0,
            995.5,
            (3200.0, -6.5, 35.0, 18.0),
            Some("High CAPE values detected - severe weather imminent"),
        ),
        seed(
            "london",
            "London Heathrow",
            "United Kingdom",
            (51.4700, -0.4543),
            RiskLevel::Yellow,
            "Weather advisory",
            72,
            (22.3, 280.0),
            18.7,
            65.0,
            1008.2,
            (800.0, -2.1, 22.0, 12.0),
            Some("Moderate wind shear detected"),
        ),
        seed(
            "tokyo",
            "Tokyo Narita",
            "Japan",
            (35.7720, 140.3929),
            RiskLevel::Green,
            "Normal conditions",
            95,
            (8.2, 120.0),
            24.1,
            58.0,
            1015.8,
            (500.0, 1.2, 18.0, 6.0),
            None,
        ),
        seed(
            "singapore",
            "Singapore Changi",
            "Singapore",
            (1.3644, 103.9915),
            RiskLevel::Yellow,
            "Thunderstorm watch",
            79,
            (12.1, 200.0),
            31.5,
            85.0,
            1009.2,
            (2800.0, -4.2, 28.0, 8.0),
            Some("High humidity and CAPE - thunderstorms possible"),
        ),
        seed(
            "newyork",
            "New York JFK",
            "United States",
            (40.6413, -73.7781),
            RiskLevel::Green,
            "Clear conditions",
            91,
            (18.5, 270.0),
            22.8,
            45.0,
            1018.5,
            (300.0, 3.1, 15.0, 15.0),
            None,
        ),
        seed(
            "sydney",
            "Sydney Kingsford",
            "Australia",
            (-33.9399, 151.1753),
            RiskLevel::Yellow,
            "Storm development possible",
            68,
            (25.2, 180.0),
            28.9,
            72.0,
            1002.1,
            (1800.0, -3.5, 31.0, 20.0),
            Some("Strong wind shear - organized storms possible"),
        ),
    ]
}
