use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Thunderstorm risk category, ordered `Green < Yellow < Red`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum RiskLevel {
    #[default]
    Green,
    Yellow,
    Red,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 3] = [RiskLevel::Green, RiskLevel::Yellow, RiskLevel::Red];

    /// One step towards Red, clamped.
    pub fn step_up(self) -> Self {
        match self {
            Self::Green => Self::Yellow,
            Self::Yellow | Self::Red => Self::Red,
        }
    }

    /// One step towards Green, clamped.
    pub fn step_down(self) -> Self {
        match self {
            Self::Red => Self::Yellow,
            Self::Yellow | Self::Green => Self::Green,
        }
    }

    /// Weight used for risk-driven fields such as cloud cover.
    pub fn base_risk(self) -> f64 {
        match self {
            Self::Red => 0.8,
            Self::Yellow => 0.4,
            Self::Green => 0.1,
        }
    }

    /// Width of the per-read noise band around the baseline.
    pub fn noise_envelope(self) -> f64 {
        match self {
            Self::Red => 0.2,
            Self::Yellow => 0.1,
            Self::Green => 0.05,
        }
    }

    /// Daily chance of a recorded thunderstorm in historical data.
    pub fn event_probability(self) -> f64 {
        match self {
            Self::Red => 0.30,
            Self::Yellow => 0.10,
            Self::Green => 0.02,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Green => "Green",
            Self::Yellow => "Yellow",
            Self::Red => "Red",
        }
    }

    pub(crate) fn to_u8(self) -> u8 {
        match self {
            Self::Green => 0,
            Self::Yellow => 1,
            Self::Red => 2,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Green,
            1 => Self::Yellow,
            _ => Self::Red,
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "green" => Ok(Self::Green),
            "yellow" => Ok(Self::Yellow),
            "red" => Ok(Self::Red),
            other => Err(format!("unknown risk level '{}'", other)),
        }
    }
}

/// Geographic location
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// Surface observations. Wind speed is in knots.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceConditions {
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub wind_speed: f64,
    pub wind_direction: f64,
    pub visibility: f64,
    #[serde(default)]
    pub cloud_cover: Option<f64>,
    pub precipitation: f64,
}

/// Convective indices. Any of them may be absent in externally sourced
/// snapshots; the simulator always fills every field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThunderstormIndices {
    #[serde(default)]
    pub cape: Option<f64>,
    #[serde(default)]
    pub lifted_index: Option<f64>,
    #[serde(default)]
    pub k_index: Option<f64>,
    #[serde(default)]
    pub wind_shear: Option<f64>,
    #[serde(default)]
    pub precipitable_water: Option<f64>,
    #[serde(default)]
    pub cloud_top_temp: Option<f64>,
    #[serde(default)]
    pub dew_point: Option<f64>,
}

/// Realtime view of a station, derived on every read and never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherSnapshot {
    pub station_id: String,
    /// Risk category observed when the snapshot was taken
    pub risk: RiskLevel,
    pub weather: SurfaceConditions,
    pub thunderstorm_data: ThunderstormIndices,
    pub last_updated: DateTime<Utc>,
}

/// One simulated day of history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalRecord {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub weather: SurfaceConditions,
    pub thunderstorm_occurred: bool,
}

/// Active thunderstorm alert for a station.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherAlert {
    pub id: String,
    pub location_id: String,
    pub location_name: String,
    pub severity: RiskLevel,
    pub title: String,
    pub message: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: String,
}

/// A risk transition applied by the drift tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskChange {
    pub station_id: String,
    pub from: RiskLevel,
    pub to: RiskLevel,
}
