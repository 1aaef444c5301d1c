//! Station registry and synthetic weather for Thunderwatch.
//!
//! Provides the fixed station list, bounded-noise realtime snapshots,
//! periodic risk drift and simulated history.

pub mod rng;
pub mod simulator;
pub mod station;
pub mod types;

pub use rng::SharedRng;
pub use simulator::{StationConditions, WeatherSimulator, MAX_HISTORY_DAYS};
pub use station::{default_stations, Baseline, Station, StationInfo, StationStore};
pub use types::*;
