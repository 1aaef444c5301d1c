//! Lifecycle of a single prediction request.
//!
//! Idle → Invoking → Done(model), or Idle → Invoking → FallingBack →
//! Done(fallback). No retries: a request that has fallen back never returns
//! to Invoking.

use crate::result::Provenance;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PredictionState {
    #[default]
    Idle,
    Invoking,
    FallingBack,
    Done(Provenance),
}

impl PredictionState {
    /// True if the model may be invoked from this state.
    pub fn can_invoke(self) -> bool {
        matches!(self, PredictionState::Idle)
    }

    pub fn is_done(self) -> bool {
        matches!(self, PredictionState::Done(_))
    }

    /// Idle → Invoking. Any other state is left unchanged.
    pub fn on_invoke(self) -> Self {
        match self {
            PredictionState::Idle => PredictionState::Invoking,
            other => other,
        }
    }

    /// Invoking → Done(model).
    pub fn on_model_success(self) -> Self {
        match self {
            PredictionState::Invoking => PredictionState::Done(Provenance::Model),
            other => other,
        }
    }

    /// Invoking → FallingBack.
    pub fn on_model_failure(self) -> Self {
        match self {
            PredictionState::Invoking => PredictionState::FallingBack,
            other => other,
        }
    }

    /// FallingBack → Done(fallback).
    pub fn on_fallback_done(self) -> Self {
        match self {
            PredictionState::FallingBack => PredictionState::Done(Provenance::Fallback),
            other => other,
        }
    }

    /// Provenance of the finished request.
    pub fn provenance(self) -> Option<Provenance> {
        match self {
            PredictionState::Done(provenance) => Some(provenance),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_allows_invoke() {
        assert!(PredictionState::Idle.can_invoke());
        assert_eq!(PredictionState::Idle.on_invoke(), PredictionState::Invoking);
    }

    #[test]
    fn busy_states_block_invoke() {
        for s in [
            PredictionState::Invoking,
            PredictionState::FallingBack,
            PredictionState::Done(Provenance::Model),
        ] {
            assert!(!s.can_invoke());
            assert_eq!(s.on_invoke(), s);
        }
    }

    #[test]
    fn model_success_path() {
        let s = PredictionState::Idle.on_invoke().on_model_success();
        assert_eq!(s, PredictionState::Done(Provenance::Model));
        assert_eq!(s.provenance(), Some(Provenance::Model));
    }

    #[test]
    fn fallback_path() {
        let s = PredictionState::Idle.on_invoke().on_model_failure();
        assert_eq!(s, PredictionState::FallingBack);
        assert!(!s.is_done());
        let s = s.on_fallback_done();
        assert_eq!(s.provenance(), Some(Provenance::Fallback));
    }

    #[test]
    fn fallback_never_retries() {
        let s = PredictionState::FallingBack;
        assert_eq!(s.on_invoke(), PredictionState::FallingBack);
        assert_eq!(s.on_model_success(), PredictionState::FallingBack);
    }

    #[test]
    fn done_is_terminal() {
        let s = PredictionState::Done(Provenance::Fallback);
        assert_eq!(s.on_model_failure(), s);
        assert_eq!(s.on_fallback_done(), s);
    }
}
