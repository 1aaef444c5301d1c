//! Per-station prediction cache with lazy expiry.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::result::StationPrediction;

pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct Entry {
    prediction: StationPrediction,
    created: Instant,
}

/// Last prediction per station. Expired entries are dropped when read.
#[derive(Debug)]
pub struct PredictionCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, Entry>>,
}

impl PredictionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, station_id: &str) -> Option<StationPrediction> {
        self.get_at(station_id, Instant::now())
    }

    fn get_at(&self, station_id: &str, now: Instant) -> Option<StationPrediction> {
        {
            let entries = self.entries.read();
            match entries.get(station_id) {
                None => return None,
                Some(entry) if now.saturating_duration_since(entry.created) < self.ttl => {
                    return Some(entry.prediction.clone());
                }
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write();
        // Re-check: another writer may have refreshed the entry meanwhile.
        if let Some(entry) = entries.get(station_id) {
            if now.saturating_duration_since(entry.created) < self.ttl {
                return Some(entry.prediction.clone());
            }
            entries.remove(station_id);
            tracing::debug!("Prediction cache entry for {} expired", station_id);
        }
        None
    }

    /// Store `prediction`, replacing any previous entry for the station.
    pub fn insert(&self, station_id: impl Into<String>, prediction: StationPrediction) {
        self.insert_at(station_id.into(), prediction, Instant::now());
    }

    fn insert_at(&self, station_id: String, prediction: StationPrediction, created: Instant) {
        self.entries.write().insert(
            station_id,
            Entry {
                prediction,
                created,
            },
        );
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Number of stored entries, expired ones included until next read.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for PredictionCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
