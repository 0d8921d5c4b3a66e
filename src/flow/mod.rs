/// Calibration flow module
///
/// Sequences user interaction on top of the detection pipeline.
///
/// ## Architecture
///
/// ```text
/// input thread(s)                 capture/UI thread
/// ───────────────                 ─────────────────
/// EventPoster::post ──> EventGate ──> FlowController::tick
///                       (mask +         ├── CalibrationSession (Capturing)
///                        one slot)      ├── CalibrationSolver  (Computing)
///                                       └── ResultSink         (Computing)
/// ```
///
/// ## Usage
///
/// ```rust,ignore
/// let mut flow = FlowController::new(settings, toolkit)?;
/// let poster = flow.poster(); // hand to the keyboard handler
/// flow.start();
///
/// loop {
///     flow.tick(&mut camera)?;
///     if let Some(snapshot) = flow.snapshot() {
///         draw_overlay(&snapshot.read());
///     }
///     show_status(&flow.status_message());
/// }
/// ```

pub mod controller;
pub mod events;
pub mod gate;
pub mod state;

// Re-export commonly used types
pub use controller::{FlowController, FlowToolkit};
pub use events::{EventMask, FlowEvent};
pub use gate::{EventGate, EventPoster};
pub use state::{FlowOutcome, FlowState};
