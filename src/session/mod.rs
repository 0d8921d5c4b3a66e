/// Calibration session module
///
/// Collects observations for one run and hands them to the solver.
///
/// ## Architecture
///
/// ```text
/// CalibrationSession
///   ├── DetectionWorker   (frames in, detections out)
///   ├── ResultSnapshot    (last detection, shared with the renderer)
///   ├── CornerRefiner     (applied on capture)
///   └── Vec<Observation>  (capture pushes, uncapture pops)
///            │
///            └── calibrate() ──> CalibrationSolver
/// ```

pub mod calibration;
pub mod observation;
pub mod solver;

// Re-export commonly used types
pub use calibration::{CalibrationSession, PumpOutcome, SessionSettings};
pub use observation::Observation;
pub use solver::{CalibrationResult, CalibrationSolver, CameraParameters, ReprojectionError};
