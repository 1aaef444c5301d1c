//! Thunderwatch application root.
//!
//! Builds every service from a [`Config`] and owns the background drift
//! task. Nothing here is global: tests build as many apps as they like.

pub mod scheduler;

use std::sync::Arc;

use parking_lot::Mutex;
use thunderwatch_core::Config;
use thunderwatch_predict::{
    ParameterMapper, PredictionCache, PredictionOrchestrator, ProcessModelBridge, RuleBasedPredictor,
};
use thunderwatch_weather::{RiskChange, SharedRng, StationStore, WeatherSimulator};
use tokio::sync::broadcast;

pub use scheduler::DriftScheduler;

pub type Orchestrator = PredictionOrchestrator<ProcessModelBridge>;

/// Main application state and lifecycle manager
pub struct App {
    config: Arc<Config>,
    store: Arc<StationStore>,
    simulator: Arc<WeatherSimulator>,
    orchestrator: Arc<Orchestrator>,
    scheduler: Mutex<Option<DriftScheduler>>,
}

impl App {
    /// Create a new application instance from `config`
    pub fn new(config: Config) -> Self {
        let rng = SharedRng::from_optional_seed(config.simulator.seed);
        let mapper_rng = rng.fork();
        let fallback_rng = rng.fork();

        let store = Arc::new(StationStore::with_default_stations());
        let simulator = Arc::new(WeatherSimulator::new(rng, config.simulator.drift_probability));

        let mut orchestrator = PredictionOrchestrator::new(
            ProcessModelBridge::new(&config.model),
            RuleBasedPredictor::new(fallback_rng, config.model.version.clone()),
            Arc::clone(&store),
            Arc::clone(&simulator),
        )
        .with_mapper(ParameterMapper::new(mapper_rng))
        .with_timeout(config.model.timeout());

        if config.cache.enabled {
            orchestrator = orchestrator.with_cache(PredictionCache::new(config.cache.ttl()));
        }

        tracing::debug!("Application built with {} stations", store.len());

        Self {
            config: Arc::new(config),
            store,
            simulator,
            orchestrator: Arc::new(orchestrator),
            scheduler: Mutex::new(None),
        }
    }

    /// Start the risk drift task. Must be called inside a tokio runtime.
    /// Does nothing if the task is already running.
    pub fn start(&self) {
        let mut scheduler = self.scheduler.lock();
        if scheduler.is_some() {
            tracing::debug!("Risk drift already running");
            return;
        }

        *scheduler = Some(DriftScheduler::spawn(
            Arc::clone(&self.store),
            Arc::clone(&self.simulator),
            self.config.simulator.tick_interval(),
        ));
    }

    pub fn is_running(&self) -> bool {
        self.scheduler
            .lock()
            .as_ref()
            .is_some_and(DriftScheduler::is_running)
    }

    /// Risk changes applied by the drift task, if it is running.
    pub fn subscribe_risk_changes(&self) -> Option<broadcast::Receiver<RiskChange>> {
        self.scheduler.lock().as_ref().map(DriftScheduler::subscribe)
    }

    /// Stop the drift task and wait for it to finish
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down application");

        let scheduler = self.scheduler.lock().take();
        if let Some(scheduler) = scheduler {
            scheduler.shutdown().await;
        }

        tracing::info!("Application shutdown complete");
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<StationStore> {
        &self.store
    }

    pub fn simulator(&self) -> &Arc<WeatherSimulator> {
        &self.simulator
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }
}
