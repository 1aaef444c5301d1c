//! Thunderstorm prediction for Thunderwatch.
//!
//! Maps weather snapshots to the 15-feature model input, invokes the trained
//! model out of process and falls back to a rule-based scorer whenever the
//! model cannot answer in time.

pub mod bridge;
pub mod cache;
pub mod features;
pub mod mapper;
pub mod orchestrator;
pub mod result;
pub mod rule_based;
pub mod state;

pub use bridge::{ExternalResult, ModelBridge, ModelStatus, ProcessModelBridge};
pub use cache::PredictionCache;
pub use features::{FeatureVector, FEATURE_COUNT, FEATURE_NAMES};
pub use mapper::ParameterMapper;
pub use orchestrator::PredictionOrchestrator;
pub use result::{PredictionResponse, PredictionResult, Provenance, RiskBand, StationPrediction};
pub use rule_based::{assess, RiskAssessment, RuleBasedPredictor};
pub use state::PredictionState;
