/// Calibration flow states
///
/// Only `FlowController` moves between these.
use std::path::PathBuf;

use super::events::EventMask;
use crate::error::SolverError;
use crate::session::CalibrationResult;

/// Stage of the calibration flow
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum FlowState {
    /// Controller exists but `start()` has not been called
    #[default]
    NotStarted,

    /// Waiting for the user to begin a run
    Welcome,

    /// Detection running, user capturing images
    Capturing,

    /// Solver running, input ignored
    Computing,

    /// Result (or cancellation) shown until acknowledged
    Done,
}

impl FlowState {
    /// Events the state accepts when no modal is open
    pub fn accepted_events(&self) -> EventMask {
        match self {
            FlowState::NotStarted => EventMask::NONE,
            FlowState::Welcome => EventMask::ADVANCE | EventMask::MODAL,
            FlowState::Capturing => EventMask::ADVANCE | EventMask::CANCEL | EventMask::MODAL,
            FlowState::Computing => EventMask::NONE,
            FlowState::Done => EventMask::ADVANCE,
        }
    }

    /// A calibration session exists
    pub fn has_session(&self) -> bool {
        matches!(self, FlowState::Capturing | FlowState::Computing)
    }

    /// Get a human-readable description of the state
    pub fn description(&self) -> &'static str {
        match self {
            FlowState::NotStarted => "Not started",
            FlowState::Welcome => "Welcome",
            FlowState::Capturing => "Capturing",
            FlowState::Computing => "Computing...",
            FlowState::Done => "Done",
        }
    }
}

/// How the last run ended
#[derive(Debug, Clone, PartialEq)]
pub enum FlowOutcome {
    /// User aborted the run
    Canceled,

    /// Parameters computed; `saved_to` is `None` when saving was off or failed
    Calibrated {
        result: CalibrationResult,
        saved_to: Option<PathBuf>,
    },

    /// Solver rejected the observations
    Failed(SolverError),
}

impl FlowOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FlowOutcome::Calibrated { .. })
    }

    /// Message shown to the user in the Done state
    pub fn message(&self) -> String {
        match self {
            FlowOutcome::Canceled => "Calibration canceled".to_string(),
            FlowOutcome::Calibrated { result, .. } => format!(
                "Camera parameters calculated (error min={:.3}, avg={:.3}, max={:.3})",
                result.error.min, result.error.avg, result.error.max
            ),
            FlowOutcome::Failed(err) => format!("Calibration failed: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::events::FlowEvent;
    use crate::session::{CameraParameters, ReprojectionError};

    #[test]
    fn test_accepted_events() {
        assert!(FlowState::NotStarted.accepted_events().is_empty());
        assert!(FlowState::Computing.accepted_events().is_empty());

        assert!(FlowState::Welcome.accepted_events().accepts(FlowEvent::Advance));
        assert!(!FlowState::Welcome.accepted_events().accepts(FlowEvent::Cancel));
        assert!(FlowState::Welcome.accepted_events().accepts(FlowEvent::ModalOpen));

        assert!(FlowState::Capturing.accepted_events().accepts(FlowEvent::Cancel));
        assert!(FlowState::Capturing.accepted_events().accepts(FlowEvent::ModalOpen));

        assert!(FlowState::Done.accepted_events().accepts(FlowEvent::Advance));
        assert!(!FlowState::Done.accepted_events().accepts(FlowEvent::ModalOpen));
    }

    #[test]
    fn test_state_predicates() {
        assert!(FlowState::Capturing.has_session());
        assert!(FlowState::Computing.has_session());
        assert!(!FlowState::Done.has_session());
        assert_eq!(FlowState::default(), FlowState::NotStarted);
    }

    #[test]
    fn test_outcome_messages() {
        assert_eq!(FlowOutcome::Canceled.message(), "Calibration canceled");

        let outcome = FlowOutcome::Calibrated {
            result: CalibrationResult {
                parameters: CameraParameters::pinhole(640, 480, 500.0, 500.0, 320.0, 240.0),
                error: ReprojectionError {
                    min: 0.1234,
                    avg: 0.25,
                    max: 1.0,
                },
            },
            saved_to: None,
        };
        assert!(outcome.is_success());
        assert_eq!(
            outcome.message(),
            "Camera parameters calculated (error min=0.123, avg=0.250, max=1.000)"
        );

        let failed = FlowOutcome::Failed(SolverError::NonConvergence { iterations: 30 });
        assert_eq!(
            failed.message(),
            "Calibration failed: Solver did not converge after 30 iterations"
        );
    }
}
