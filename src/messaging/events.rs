/// Notification types for the calibration flow
///
/// Notifications describe things that have happened (past tense).
/// They are broadcast to all subscribers.
use std::path::PathBuf;

use crate::flow::FlowState;

/// Flow notifications
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// Flow state changed
    StateChanged { old_state: FlowState, new_state: FlowState },

    /// An observation was accepted
    ImageCaptured { count: usize, max: usize },

    /// The last observation was discarded
    ImageDiscarded { count: usize, max: usize },

    /// Run abandoned by the user
    RunCanceled,

    /// Solver finished successfully
    CalibrationSucceeded {
        min_error: f64,
        avg_error: f64,
        max_error: f64,
        saved_to: Option<PathBuf>,
    },

    /// Solver failed
    CalibrationFailed { message: String },

    /// Detection pipeline stopped working
    ErrorOccurred { message: String, context: String },
}

impl Notification {
    /// Get a human-readable description of the notification
    pub fn description(&self) -> String {
        match self {
            Notification::StateChanged { new_state, .. } => {
                format!("Flow state: {}", new_state.description())
            }
            Notification::ImageCaptured { count, max } => {
                format!("Captured image {}/{}", count, max)
            }
            Notification::ImageDiscarded { count, max } => {
                format!("Discarded image, {}/{} remain", count, max)
            }
            Notification::RunCanceled => "Calibration canceled".to_string(),
            Notification::CalibrationSucceeded { avg_error, .. } => {
                format!("Calibration done (avg error {:.3})", avg_error)
            }
            Notification::CalibrationFailed { message } => {
                format!("Calibration failed: {}", message)
            }
            Notification::ErrorOccurred { message, context } => {
                format!("Error in {}: {}", context, message)
            }
        }
    }

    /// Check if this is an error notification
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Notification::CalibrationFailed { .. } | Notification::ErrorOccurred { .. }
        )
    }
}
