//! Synthetic realtime weather derived from station baselines.
//!
//! Snapshots are pure functions of the station baseline, its current risk
//! category and one uniform draw. The drift tick is the only operation that
//! writes, and it only touches the atomic risk cell of each station.

use chrono::{DateTime, Days, NaiveDate, Utc};
use rand::Rng;
use serde::Serialize;
use thunderwatch_core::WeatherError;

use crate::rng::SharedRng;
use crate::station::{Station, StationInfo, StationStore};
use crate::types::{
    HistoricalRecord, RiskChange, RiskLevel, SurfaceConditions, ThunderstormIndices,
    WeatherAlert, WeatherSnapshot,
};

/// Upper bound on records returned by a historical query.
pub const MAX_HISTORY_DAYS: u64 = 30;

/// Default chance per station per tick of a risk step.
pub const DEFAULT_DRIFT_PROBABILITY: f64 = 0.05;

/// How long an issued alert stays active.
const ALERT_LIFETIME_HOURS: i64 = 4;

/// Station view together with a fresh snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StationConditions {
    #[serde(flatten)]
    pub station: StationInfo,
    pub realtime: WeatherSnapshot,
}

#[derive(Debug)]
pub struct WeatherSimulator {
    rng: SharedRng,
    drift_probability: f64,
}

impl WeatherSimulator {
    pub fn new(rng: SharedRng, drift_probability: f64) -> Self {
        let drift_probability = if drift_probability.is_finite() {
            drift_probability.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            rng,
            drift_probability,
        }
    }

    pub fn drift_probability(&self) -> f64 {
        self.drift_probability
    }

    /// Realtime snapshot using the simulator's own generator.
    pub fn snapshot(&self, station: &Station) -> WeatherSnapshot {
        self.rng.with(|rng| self.snapshot_with(station, rng))
    }

    /// Realtime snapshot drawing from `rng`.
    ///
    /// Reads the risk category once and draws exactly one uniform variate.
    pub fn snapshot_with<R: Rng + ?Sized>(&self, station: &Station, rng: &mut R) -> WeatherSnapshot {
        let risk = station.risk();
        let u: f64 = rng.random();
        let (weather, thunderstorm_data) = derive_conditions(station, risk, u);

        WeatherSnapshot {
            station_id: station.id().to_string(),
            risk,
            weather,
            thunderstorm_data,
            last_updated: Utc::now(),
        }
    }

    /// Snapshot of every station, in store order.
    pub fn current_conditions(&self, store: &StationStore) -> Vec<StationConditions> {
        store
            .list()
            .iter()
            .map(|station| StationConditions {
                station: station.info(),
                realtime: self.snapshot(station),
            })
            .collect()
    }

    /// Apply one round of risk drift to every station.
    pub fn tick(&self, store: &StationStore) -> Vec<RiskChange> {
        self.rng.with(|rng| self.tick_with(store, rng))
    }

    pub fn tick_with<R: Rng + ?Sized>(&self, store: &StationStore, rng: &mut R) -> Vec<RiskChange> {
        let mut changes = Vec::new();

        for station in store.list() {
            if rng.random::<f64>() >= self.drift_probability {
                continue;
            }

            let upward = rng.random_bool(0.5);
            let (from, to) = station.update_risk(|risk| {
                if upward {
                    risk.step_up()
                } else {
                    risk.step_down()
                }
            });

            if from != to {
                tracing::info!("{} risk level changed from {} to {}", station.name(), from, to);
                changes.push(RiskChange {
                    station_id: station.id().to_string(),
                    from,
                    to,
                });
            }
        }

        tracing::debug!("Drift tick applied {} risk changes", changes.len());
        changes
    }

    /// Daily history between two dates.
    pub fn historical(
        &self,
        station: &Station,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<HistoricalRecord>, WeatherError> {
        self.rng
            .with(|rng| self.historical_with(station, start, end, rng))
    }

    /// Daily history drawing from `rng`.
    ///
    /// One record per whole day between `start` and `end`, beginning at
    /// `start`, capped at [`MAX_HISTORY_DAYS`].
    pub fn historical_with<R: Rng + ?Sized>(
        &self,
        station: &Station,
        start: NaiveDate,
        end: NaiveDate,
        rng: &mut R,
    ) -> Result<Vec<HistoricalRecord>, WeatherError> {
        if end < start {
            return Err(WeatherError::InvalidRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }

        let risk = station.risk();
        let days = u64::try_from((end - start).num_days())
            .unwrap_or(0)
            .min(MAX_HISTORY_DAYS);

        let mut records = Vec::with_capacity(days as usize);
        for offset in 0..days {
            let Some(date) = start.checked_add_days(Days::new(offset)) else {
                break;
            };
            let u: f64 = rng.random();
            let (weather, _) = derive_conditions(station, risk, u);
            let thunderstorm_occurred = rng.random::<f64>() < risk.event_probability();
            records.push(HistoricalRecord {
                date,
                weather,
                thunderstorm_occurred,
            });
        }

        Ok(records)
    }

    /// Historical query with ISO date strings (`YYYY-MM-DD` or RFC 3339).
    pub fn historical_iso(
        &self,
        station: &Station,
        start: &str,
        end: &str,
    ) -> Result<Vec<HistoricalRecord>, WeatherError> {
        let start = parse_iso_date(start)?;
        let end = parse_iso_date(end)?;
        self.historical(station, start, end)
    }

    /// Alerts for stations that carry alert text and are not currently Green.
    pub fn active_alerts(&self, store: &StationStore, now: DateTime<Utc>) -> Vec<WeatherAlert> {
        store
            .list()
            .iter()
            .filter_map(|station| {
                let severity = station.risk();
                let message = station.baseline().alert.as_ref()?;
                if severity == RiskLevel::Green {
                    return None;
                }
                Some(WeatherAlert {
                    id: format!("alert_{}_{}", station.id(), now.timestamp_millis()),
                    location_id: station.id().to_string(),
                    location_name: station.name().to_string(),
                    severity,
                    title: station.baseline().status.clone(),
                    message: message.clone(),
                    issued_at: now,
                    expires_at: now + chrono::Duration::hours(ALERT_LIFETIME_HOURS),
                    kind: "thunderstorm".to_string(),
                })
            })
            .collect()
    }
}

impl Default for WeatherSimulator {
    fn default() -> Self {
        Self::new(SharedRng::default(), DEFAULT_DRIFT_PROBABILITY)
    }
}

/// Perturb a station baseline by a single variate `u` in `[0, 1)`.
fn derive_conditions(
    station: &Station,
    risk: RiskLevel,
    u: f64,
) -> (SurfaceConditions, ThunderstormIndices) {
    let b = station.baseline();
    let base_risk = risk.base_risk();
    let variation = (u - 0.5) * risk.noise_envelope();
    // Convective indices swing twice as wide as surface fields.
    let indices_variation = variation * 2.0;

    let weather = SurfaceConditions {
        temperature: b.temperature + variation * 5.0,
        humidity: (b.humidity + variation * 20.0).clamp(20.0, 100.0),
        pressure: b.pressure + variation * 10.0,
        wind_speed: (b.wind_speed + variation * 8.0).max(0.0),
        wind_direction: (b.wind_direction + variation * 30.0).rem_euclid(360.0),
        visibility: (15.0 + variation * 10.0).max(1.0),
        cloud_cover: Some((base_risk + variation * 0.3).clamp(0.0, 1.0)),
        precipitation: if base_risk > 0.5 { u * 5.0 } else { 0.0 },
    };

    let indices = ThunderstormIndices {
        cape: Some((b.cape + indices_variation * 1000.0).max(0.0)),
        lifted_index: Some(b.lifted_index + indices_variation * 2.0),
        k_index: Some((b.k_index + indices_variation * 8.0).clamp(0.0, 50.0)),
        wind_shear: Some((b.wind_shear + indices_variation * 5.0).max(0.0)),
        precipitable_water: Some((u * 50.0 + base_risk * 30.0).floor()),
        cloud_top_temp: Some((-u * 20.0 - base_risk * 30.0).floor()),
        dew_point: Some((u * 25.0 + 5.0).floor()),
    };

    (weather, indices)
}

fn parse_iso_date(value: &str) -> Result<NaiveDate, WeatherError> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(value).map(|dt| dt.date_naive()))
        .map_err(|_| WeatherError::InvalidDate(value.to_string()))
}
