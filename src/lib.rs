//! Interactive camera calibration pipeline
//!
//! Pattern detection runs on its own thread so the capture loop never
//! waits for it. Completed detections are published to a lock-guarded
//! snapshot that the renderer and the capture logic read. A flow controller
//! sequences a run: welcome, capture N images, compute parameters, report.
//!
//! The numerical pieces (pattern detector, corner refiner, solver) and the
//! camera are supplied by the caller through the traits in `detection`,
//! `session` and `capture`.

pub mod capture;
pub mod config;
pub mod detection;
pub mod error;
pub mod flow;
pub mod logging;
pub mod messaging;
pub mod pattern;
pub mod persistence;
pub mod session;
pub mod stats;

pub use capture::{FrameSource, ImageSequenceSource, MemoryFrameSource};
pub use config::CalibratorConfig;
pub use detection::{
    CornerRefiner, DetectOutcome, DetectionRecord, DetectionWorker, ImageView, PatternDetector, RefineCriteria,
    ResultSnapshot, WorkerState,
};
pub use error::{AppResult, ConfigError, DetectionError, FlowError, SessionError, SolverError};
pub use flow::{EventPoster, FlowController, FlowEvent, FlowOutcome, FlowState, FlowToolkit};
pub use messaging::{Notification, NotificationBus};
pub use pattern::{PatternGeometry, PatternKind};
pub use persistence::{CalibrationReport, JsonResultStore, ResultSink};
pub use session::{
    CalibrationResult, CalibrationSession, CalibrationSolver, CameraParameters, Observation, ReprojectionError,
    SessionSettings,
};
