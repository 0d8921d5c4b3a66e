/// Calibration flow controller
///
/// Drives one calibration run after another on the capture/UI thread.
/// Input arrives through `EventPoster::post` from any thread; the
/// controller acts on it in `tick`, which the capture loop calls once per
/// frame.
///
/// ```text
/// NotStarted ─start─> Welcome ─Advance─> Capturing ─(target reached)─> Computing
///                        ▲                  │  Advance: capture          │
///                        │                  │  Cancel: undo one / abort  │
///                        │                  ▼                            ▼
///                        └───── Advance ── Done <─────── solver ─────────┘
/// ```
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::events::FlowEvent;
use super::gate::{EventGate, EventPoster};
use super::state::{FlowOutcome, FlowState};
use crate::capture::FrameSource;
use crate::detection::{CornerRefiner, PatternDetector, ResultSnapshot};
use crate::error::FlowError;
use crate::messaging::{Notification, NotificationBus};
use crate::persistence::{CalibrationReport, ResultSink};
use crate::session::{CalibrationResult, CalibrationSession, CalibrationSolver, SessionSettings};

const WELCOME_MESSAGE: &str = "Welcome to the camera calibrator\n\n\
    Press 'space' to begin a calibration run.\n\n\
    Press 'p' for settings and help.";

const WELCOME_AGAIN_MESSAGE: &str = "Press 'space' to begin a calibration run.\n\n\
    Press 'p' for settings and help.";

/// External collaborators used by every run
pub struct FlowToolkit {
    pub detector: Arc<dyn PatternDetector>,
    pub refiner: Arc<dyn CornerRefiner>,
    pub solver: Arc<dyn CalibrationSolver>,
    /// Where successful results go; nothing is saved when unset
    pub sink: Option<Box<dyn ResultSink>>,
    pub bus: Option<NotificationBus>,
    /// Camera identifier recorded with saved results
    pub device_id: Option<String>,
}

impl FlowToolkit {
    pub fn new(
        detector: Arc<dyn PatternDetector>,
        refiner: Arc<dyn CornerRefiner>,
        solver: Arc<dyn CalibrationSolver>,
    ) -> Self {
        Self {
            detector,
            refiner,
            solver,
            sink: None,
            bus: None,
            device_id: None,
        }
    }

    pub fn with_sink(mut self, sink: Box<dyn ResultSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_bus(mut self, bus: NotificationBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }
}

pub struct FlowController {
    settings: SessionSettings,
    toolkit: FlowToolkit,
    gate: EventGate,
    state: FlowState,
    session: Option<CalibrationSession>,
    outcome: Option<FlowOutcome>,
    /// Cleared by every Cancel and at run start
    captured_since_cancel: bool,
    runs_started: u64,
}

impl FlowController {
    /// Create a controller in `NotStarted`
    pub fn new(settings: SessionSettings, toolkit: FlowToolkit) -> Result<Self, FlowError> {
        settings.validate()?;

        Ok(Self {
            settings,
            toolkit,
            gate: EventGate::new(),
            state: FlowState::NotStarted,
            session: None,
            outcome: None,
            captured_since_cancel: false,
            runs_started: 0,
        })
    }

    /// Enter Welcome; no-op unless `NotStarted`
    pub fn start(&mut self) {
        if self.state == FlowState::NotStarted {
            self.transition(FlowState::Welcome);
        }
    }

    /// Tear down any active run and return to `NotStarted`
    pub fn stop(&mut self) {
        self.end_session();
        self.gate.reset();
        self.outcome = None;
        if self.state != FlowState::NotStarted {
            self.transition(FlowState::NotStarted);
        }
    }

    /// Handle for input handlers on other threads
    pub fn poster(&self) -> EventPoster {
        self.gate.poster()
    }

    /// Post an event from the controller's own thread
    pub fn post_event(&self, event: FlowEvent) -> bool {
        self.gate.poster().post(event)
    }

    /// Advance the flow by one capture-loop iteration
    ///
    /// While capturing, feeds the newest frame from `source` to the worker.
    /// In Computing, runs the solver and moves to Done. Then acts on the
    /// pending event, if any.
    pub fn tick(&mut self, source: &mut dyn FrameSource) -> Result<(), FlowError> {
        debug_assert_eq!(self.state.has_session(), self.session.is_some());

        match self.state {
            FlowState::NotStarted => return Err(FlowError::NotStarted),
            FlowState::Capturing => self.pump(source)?,
            FlowState::Computing => self.compute()?,
            FlowState::Welcome | FlowState::Done => {}
        }

        self.handle_pending()
    }

    fn pump(&mut self, source: &mut dyn FrameSource) -> Result<(), FlowError> {
        let Some(session) = self.session.as_mut() else {
            return Err(FlowError::NoActiveSession);
        };

        let Some(frame) = source.checkout_frame() else {
            return Ok(());
        };
        let pumped = session.pump_frame(frame);
        source.checkin_frame();

        if let Err(err) = pumped {
            error!("Detection pipeline failed: {err}");
            self.publish(Notification::ErrorOccurred {
                message: err.to_string(),
                context: "detection".to_string(),
            });
            return Err(err.into());
        }
        Ok(())
    }

    fn handle_pending(&mut self) -> Result<(), FlowError> {
        let Some(event) = self.gate.take_pending() else {
            return Ok(());
        };
        if !self.state.accepted_events().accepts(event) {
            debug!("Ignoring {} event in {}", event.description(), self.state.description());
            return Ok(());
        }

        match (self.state, event) {
            (FlowState::Welcome, FlowEvent::Advance) => self.begin_run()?,
            (FlowState::Capturing, FlowEvent::Advance) => self.capture()?,
            (FlowState::Capturing, FlowEvent::Cancel) => self.cancel()?,
            (FlowState::Done, FlowEvent::Advance) => {
                self.outcome = None;
                self.transition(FlowState::Welcome);
            }
            _ => {}
        }
        Ok(())
    }

    fn begin_run(&mut self) -> Result<(), FlowError> {
        let session = CalibrationSession::new(
            self.settings,
            Arc::clone(&self.toolkit.detector),
            Arc::clone(&self.toolkit.refiner),
        )?;

        self.session = Some(session);
        self.captured_since_cancel = false;
        self.runs_started += 1;
        self.transition(FlowState::Capturing);
        Ok(())
    }

    fn capture(&mut self) -> Result<(), FlowError> {
        let Some(session) = self.session.as_mut() else {
            return Err(FlowError::NoActiveSession);
        };
        if !session.capture() {
            debug!("Capture ignored: pattern not found in latest detection");
            return Ok(());
        }

        self.captured_since_cancel = true;
        let (count, max) = (session.count(), session.count_max());
        let complete = session.is_complete();

        self.publish(Notification::ImageCaptured { count, max });
        if complete {
            self.transition(FlowState::Computing);
        }
        Ok(())
    }

    fn cancel(&mut self) -> Result<(), FlowError> {
        let Some(session) = self.session.as_mut() else {
            return Err(FlowError::NoActiveSession);
        };

        if self.captured_since_cancel {
            self.captured_since_cancel = false;
            session.uncapture();
            let (count, max) = (session.count(), session.count_max());
            self.publish(Notification::ImageDiscarded { count, max });
            return Ok(());
        }

        session.uncapture_all();
        self.end_session();
        info!("Calibration canceled");
        self.outcome = Some(FlowOutcome::Canceled);
        self.publish(Notification::RunCanceled);
        self.transition(FlowState::Done);
        Ok(())
    }

    fn compute(&mut self) -> Result<(), FlowError> {
        let Some(session) = self.session.as_ref() else {
            return Err(FlowError::NoActiveSession);
        };

        let result = session.calibrate(self.toolkit.solver.as_ref());
        let observation_count = session.count();
        self.end_session();

        let outcome = match result {
            Ok(result) => {
                let saved_to = self.save(&result, observation_count);
                self.publish(Notification::CalibrationSucceeded {
                    min_error: result.error.min,
                    avg_error: result.error.avg,
                    max_error: result.error.max,
                    saved_to: saved_to.clone(),
                });
                FlowOutcome::Calibrated { result, saved_to }
            }
            Err(err) => {
                self.publish(Notification::CalibrationFailed {
                    message: err.to_string(),
                });
                FlowOutcome::Failed(err)
            }
        };

        info!("{}", outcome.message());
        self.outcome = Some(outcome);
        self.transition(FlowState::Done);
        Ok(())
    }

    /// Hand the result to the sink; failures are logged, not fatal
    fn save(&mut self, result: &CalibrationResult, observation_count: usize) -> Option<PathBuf> {
        let sink = self.toolkit.sink.as_mut()?;
        let report = CalibrationReport {
            result: result.clone(),
            geometry: self.settings.geometry,
            observation_count,
            device_id: self.toolkit.device_id.clone(),
        };

        match sink.save(&report) {
            Ok(path) => Some(path),
            Err(err) => {
                warn!("Failed to save camera parameters: {err:#}");
                None
            }
        }
    }

    /// Drop the session, joining its worker
    fn end_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(err) = session.shutdown() {
                warn!("Detection worker did not shut down cleanly: {err}");
            }
        }
    }

    fn transition(&mut self, new_state: FlowState) {
        let old_state = self.state;
        self.state = new_state;
        self.gate.set_state_mask(new_state.accepted_events());

        info!(
            "Flow state: {} -> {}",
            old_state.description(),
            new_state.description()
        );
        self.publish(Notification::StateChanged { old_state, new_state });
    }

    fn publish(&self, notification: Notification) {
        if let Some(bus) = &self.toolkit.bus {
            bus.publish(notification);
        }
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    /// Last published detection, while a run is active
    pub fn snapshot(&self) -> Option<Arc<ResultSnapshot>> {
        self.session.as_ref().map(CalibrationSession::snapshot)
    }

    /// (captured, target) while a run is active
    pub fn progress(&self) -> Option<(usize, usize)> {
        self.session
            .as_ref()
            .map(|session| (session.count(), session.count_max()))
    }

    /// Result of the last run, until acknowledged
    pub fn outcome(&self) -> Option<&FlowOutcome> {
        self.outcome.as_ref()
    }

    pub fn session(&self) -> Option<&CalibrationSession> {
        self.session.as_ref()
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn is_modal_open(&self) -> bool {
        self.gate.is_modal_open()
    }

    /// Text for the message box or status bar
    pub fn status_message(&self) -> String {
        match self.state {
            FlowState::NotStarted => String::new(),
            FlowState::Welcome if self.runs_started == 0 => WELCOME_MESSAGE.to_string(),
            FlowState::Welcome => WELCOME_AGAIN_MESSAGE.to_string(),
            FlowState::Capturing => {
                let (count, max) = self.progress().unwrap_or((0, self.settings.target_count));
                format!("Capturing image {}/{}", count, max)
            }
            FlowState::Computing => "Calculating camera parameters...".to_string(),
            FlowState::Done => self
                .outcome
                .as_ref()
                .map(FlowOutcome::message)
                .unwrap_or_default(),
        }
    }
}

impl Drop for FlowController {
    fn drop(&mut self) {
        self.end_session();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::MemoryFrameSource;
    use crate::detection::{DetectOutcome, ImageView, NoRefinement};
    use crate::error::SolverError;
    use crate::pattern::{PatternGeometry, PatternKind};
    use crate::session::{CameraParameters, Observation, ReprojectionError};
    use nalgebra::Point2;
    use std::thread;
    use std::time::Duration;

    /// Finds the pattern in every frame whose first byte is non-zero
    struct MarkerDetector;

    impl PatternDetector for MarkerDetector {
        fn detect(
            &self,
            image: ImageView<'_>,
            geometry: &PatternGeometry,
            corners: &mut [Point2<f32>],
        ) -> DetectOutcome {
            for corner in corners.iter_mut() {
                *corner = Point2::new(image.data[0] as f32, 0.0);
            }
            if image.data[0] > 0 {
                DetectOutcome::found(geometry.point_count())
            } else {
                DetectOutcome::not_found()
            }
        }

        fn name(&self) -> &'static str {
            "MarkerDetector"
        }
    }

    struct ScriptedSolver {
        fail: bool,
    }

    impl CalibrationSolver for ScriptedSolver {
        fn calibrate(
            &self,
            observations: &[Observation],
            _: &PatternGeometry,
            width: u32,
            height: u32,
        ) -> Result<CalibrationResult, SolverError> {
            if self.fail {
                return Err(SolverError::Degenerate("all views coplanar".to_string()));
            }
            Ok(CalibrationResult {
                parameters: CameraParameters::pinhole(width, height, 100.0, 100.0, 1.0, 1.0),
                error: ReprojectionError {
                    min: 0.0,
                    avg: observations.len() as f64,
                    max: 1.0,
                },
            })
        }
    }

    fn controller(target: usize, fail: bool) -> FlowController {
        let geometry = PatternGeometry::new(PatternKind::Chessboard, 3, 3, 10.0).unwrap();
        let settings = SessionSettings::new(geometry, target, 2, 2);
        let toolkit = FlowToolkit::new(
            Arc::new(MarkerDetector),
            Arc::new(NoRefinement),
            Arc::new(ScriptedSolver { fail }),
        );
        FlowController::new(settings, toolkit).unwrap()
    }

    fn found_source() -> MemoryFrameSource {
        MemoryFrameSource::new(2, 2, vec![vec![1; 4]]).unwrap().looping(true)
    }

    /// Tick until the snapshot holds a detection
    fn wait_for_detection(flow: &mut FlowController, source: &mut MemoryFrameSource) {
        for _ in 0..400 {
            flow.tick(source).unwrap();
            if flow.snapshot().map(|s| s.summary().run_id > 0).unwrap_or(false) {
                return;
            }
            thread::sleep(Duration::from_millis(2));
        }
        panic!("no detection published");
    }

    #[test]
    fn test_events_rejected_before_start() {
        let mut flow = controller(2, false);
        let mut source = found_source();
        assert!(!flow.post_event(FlowEvent::Advance));
        assert!(matches!(flow.tick(&mut source), Err(FlowError::NotStarted)));

        flow.start();
        assert_eq!(flow.state(), FlowState::Welcome);
        assert!(flow.status_message().starts_with("Welcome"));
    }

    #[test]
    fn test_full_run_to_done_and_back() {
        let mut flow = controller(2, false);
        let mut source = found_source();
        flow.start();

        assert!(flow.post_event(FlowEvent::Advance));
        flow.tick(&mut source).unwrap();
        assert_eq!(flow.state(), FlowState::Capturing);
        assert_eq!(flow.status_message(), "Capturing image 0/2");

        wait_for_detection(&mut flow, &mut source);
        assert!(flow.post_event(FlowEvent::Advance));
        flow.tick(&mut source).unwrap();
        assert_eq!(flow.progress(), Some((1, 2)));

        assert!(flow.post_event(FlowEvent::Advance));
        flow.tick(&mut source).unwrap();
        assert_eq!(flow.state(), FlowState::Computing);
        assert_eq!(flow.status_message(), "Calculating camera parameters...");
        assert!(!flow.post_event(FlowEvent::Advance));

        flow.tick(&mut source).unwrap();
        assert_eq!(flow.state(), FlowState::Done);
        assert!(flow.session().is_none());
        assert!(flow.outcome().map(FlowOutcome::is_success).unwrap_or(false));
        assert_eq!(
            flow.status_message(),
            "Camera parameters calculated (error min=0.000, avg=2.000, max=1.000)"
        );

        assert!(flow.post_event(FlowEvent::Advance));
        flow.tick(&mut source).unwrap();
        assert_eq!(flow.state(), FlowState::Welcome);
        assert!(flow.outcome().is_none());
        assert!(flow.status_message().starts_with("Press 'space'"));
    }

    #[test]
    fn test_solver_failure_reported_in_done() {
        let mut flow = controller(1, true);
        let mut source = found_source();
        flow.start();

        flow.post_event(FlowEvent::Advance);
        flow.tick(&mut source).unwrap();
        wait_for_detection(&mut flow, &mut source);
        flow.post_event(FlowEvent::Advance);
        flow.tick(&mut source).unwrap();
        flow.tick(&mut source).unwrap();

        assert_eq!(flow.state(), FlowState::Done);
        assert!(matches!(
            flow.outcome(),
            Some(FlowOutcome::Failed(SolverError::Degenerate(_)))
        ));
        assert_eq!(
            flow.status_message(),
            "Calibration failed: Degenerate calibration input: all views coplanar"
        );
    }

    #[test]
    fn test_modal_pauses_events_but_not_frames() {
        let mut flow = controller(3, false);
        let mut source = found_source();
        flow.start();
        flow.post_event(FlowEvent::Advance);
        flow.tick(&mut source).unwrap();

        assert!(flow.post_event(FlowEvent::ModalOpen));
        assert!(flow.is_modal_open());
        assert!(!flow.post_event(FlowEvent::Advance));
        assert!(!flow.post_event(FlowEvent::Cancel));

        wait_for_detection(&mut flow, &mut source);
        assert_eq!(flow.state(), FlowState::Capturing);

        assert!(flow.post_event(FlowEvent::ModalClose));
        assert!(flow.post_event(FlowEvent::Advance));
        flow.tick(&mut source).unwrap();
        assert_eq!(flow.progress(), Some((1, 3)));
    }

    #[test]
    fn test_capture_and_cancel_need_a_session() {
        let mut flow = controller(3, false);
        flow.start();

        assert!(matches!(flow.capture(), Err(FlowError::NoActiveSession)));
        assert!(matches!(flow.cancel(), Err(FlowError::NoActiveSession)));
        assert_eq!(flow.state(), FlowState::Welcome);
        assert!(flow.outcome().is_none());
    }

    #[test]
    fn test_stop_returns_to_not_started() {
        let mut flow = controller(3, false);
        let mut source = found_source();
        flow.start();
        flow.post_event(FlowEvent::Advance);
        flow.tick(&mut source).unwrap();
        assert!(flow.session().is_some());

        flow.stop();
        assert_eq!(flow.state(), FlowState::NotStarted);
        assert!(flow.session().is_none());
        assert!(!flow.post_event(FlowEvent::Advance));
    }
}
