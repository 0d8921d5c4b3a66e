/// Calibration session
///
/// Owns the detection worker, the published snapshot and the list of
/// accepted observations for one calibration run. Created when the run
/// starts, dropped when it ends; dropping joins the worker.
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::observation::Observation;
use super::solver::{CalibrationResult, CalibrationSolver};
use crate::detection::{
    CornerRefiner, DetectionRecord, DetectionWorker, PatternDetector, RefineCriteria, ResultSnapshot,
};
use crate::error::{DetectionError, SessionError, SolverError};
use crate::pattern::PatternGeometry;
use crate::stats::{FrameRateCounter, LatencyStats};

/// Fixed parameters of one run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSettings {
    pub geometry: PatternGeometry,
    /// Observations needed before calibrating
    pub target_count: usize,
    pub width: u32,
    pub height: u32,
    pub refine: RefineCriteria,
}

impl SessionSettings {
    pub fn new(geometry: PatternGeometry, target_count: usize, width: u32, height: u32) -> Self {
        Self {
            geometry,
            target_count,
            width,
            height,
            refine: RefineCriteria::default(),
        }
    }

    pub fn with_refine(mut self, refine: RefineCriteria) -> Self {
        self.refine = refine;
        self
    }

    pub fn validate(&self) -> Result<(), SessionError> {
        let geometry = &self.geometry;
        PatternGeometry::new(geometry.kind, geometry.columns, geometry.rows, geometry.spacing)?;

        if self.width == 0 || self.height == 0 {
            return Err(SessionError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        if self.target_count == 0 {
            return Err(SessionError::InvalidTarget(self.target_count));
        }
        Ok(())
    }
}

/// What one capture-loop tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PumpOutcome {
    /// A finished detection was published to the snapshot
    pub collected: bool,
    /// The frame was handed to the worker (false: worker busy, frame dropped)
    pub submitted: bool,
}

pub struct CalibrationSession {
    worker: DetectionWorker,
    snapshot: Arc<ResultSnapshot>,
    refiner: Arc<dyn CornerRefiner>,
    settings: SessionSettings,
    observations: Vec<Observation>,
    latency: LatencyStats,
    frame_rate: FrameRateCounter,
    frames_submitted: u64,
    frames_dropped: u64,
    closed: bool,
}

impl CalibrationSession {
    /// Allocate both detection records and start the worker
    ///
    /// Nothing is created when validation or allocation fails.
    pub fn new(
        settings: SessionSettings,
        detector: Arc<dyn PatternDetector>,
        refiner: Arc<dyn CornerRefiner>,
    ) -> Result<Self, SessionError> {
        settings.validate()?;

        let worker_record = DetectionRecord::new(settings.geometry, settings.width, settings.height)?;
        let snapshot_record = DetectionRecord::new(settings.geometry, settings.width, settings.height)?;

        let mut observations = Vec::new();
        observations
            .try_reserve_exact(settings.target_count)
            .map_err(|_| SessionError::BufferAllocation {
                bytes: settings
                    .target_count
                    .saturating_mul(std::mem::size_of::<Observation>()),
            })?;

        let detector_name = detector.name();
        let worker = DetectionWorker::start(detector, worker_record)?;

        info!(
            "Calibration session started: {} {}x{} at {}, {} images, {}x{} frames, detector {}",
            settings.geometry.kind.title(),
            settings.geometry.columns,
            settings.geometry.rows,
            settings.geometry.spacing,
            settings.target_count,
            settings.width,
            settings.height,
            detector_name
        );

        Ok(Self {
            worker,
            snapshot: Arc::new(ResultSnapshot::new(snapshot_record)),
            refiner,
            settings,
            observations,
            latency: LatencyStats::with_capacity(256),
            frame_rate: FrameRateCounter::default(),
            frames_submitted: 0,
            frames_dropped: 0,
            closed: false,
        })
    }

    /// Publish a finished detection, if any
    pub fn collect(&mut self) -> Result<bool, DetectionError> {
        let Some(record) = self.worker.poll_and_collect()? else {
            return Ok(false);
        };

        self.latency.add(record.elapsed());
        self.snapshot.update_from(record);
        Ok(true)
    }

    /// Offer a frame to the worker; dropped when it is busy
    pub fn submit(&mut self, frame: &[u8]) -> Result<bool, DetectionError> {
        let submitted = self.worker.try_submit(frame)?;
        if submitted {
            self.frames_submitted += 1;
        } else {
            self.frames_dropped += 1;
        }
        Ok(submitted)
    }

    /// One capture-loop tick: collect, then submit the new frame
    pub fn pump_frame(&mut self, frame: &[u8]) -> Result<PumpOutcome, DetectionError> {
        self.frame_rate.tick();
        let collected = self.collect()?;
        let submitted = self.submit(frame)?;
        Ok(PumpOutcome { collected, submitted })
    }

    /// Accept the current snapshot as an observation
    ///
    /// Returns false when the pattern was not found in the latest collected
    /// detection or when the target count is already reached.
    pub fn capture(&mut self) -> bool {
        if self.observations.len() >= self.settings.target_count {
            return false;
        }

        let (points, run_id) = {
            let record = self.snapshot.read();
            if !record.found() {
                return false;
            }

            // Refines a copy; the image still comes from the snapshot, so
            // the lock stays held until refinement is done.
            let mut points = record.points().to_vec();
            self.refiner.refine(record.image(), &mut points, &self.settings.refine);
            (points, record.run_id())
        };

        self.observations.push(Observation::new(points, run_id));
        let index = self.observations.len();
        info!("Captured image {}/{}", index, self.settings.target_count);
        if let Some(observation) = self.observations.last() {
            debug!("Image {} points: {:?}", index, observation.points());
        }
        true
    }

    /// Remove the most recent observation
    pub fn uncapture(&mut self) -> bool {
        match self.observations.pop() {
            Some(_) => {
                info!(
                    "Discarded image {}/{}",
                    self.observations.len() + 1,
                    self.settings.target_count
                );
                true
            }
            None => false,
        }
    }

    /// Drop every observation
    pub fn uncapture_all(&mut self) {
        if !self.observations.is_empty() {
            info!("Discarded all {} captured images", self.observations.len());
        }
        self.observations.clear();
    }

    /// Run the solver over all observations
    ///
    /// Only valid once the target count has been reached.
    pub fn calibrate(&self, solver: &dyn CalibrationSolver) -> Result<CalibrationResult, SolverError> {
        if self.observations.len() != self.settings.target_count {
            return Err(SolverError::InsufficientObservations {
                have: self.observations.len(),
                need: self.settings.target_count,
            });
        }

        info!(
            "Calibrating from {} images with {}",
            self.observations.len(),
            solver.name()
        );
        let result = solver.calibrate(
            &self.observations,
            &self.settings.geometry,
            self.settings.width,
            self.settings.height,
        );

        match &result {
            Ok(result) => info!(
                "Calibration error: min={:.3}, avg={:.3}, max={:.3}",
                result.error.min, result.error.avg, result.error.max
            ),
            Err(err) => warn!("Calibration failed: {err}"),
        }
        result
    }

    pub fn count(&self) -> usize {
        self.observations.len()
    }

    pub fn count_max(&self) -> usize {
        self.settings.target_count
    }

    /// Target count reached
    pub fn is_complete(&self) -> bool {
        self.observations.len() >= self.settings.target_count
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Shared handle to the last published detection
    pub fn snapshot(&self) -> Arc<ResultSnapshot> {
        Arc::clone(&self.snapshot)
    }

    pub fn latency(&self) -> &LatencyStats {
        &self.latency
    }

    /// Stop the worker and wait for it
    ///
    /// Safe to call more than once; dropping the session does the same.
    pub fn shutdown(&mut self) -> Result<(), DetectionError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let result = self.worker.shutdown();
        self.latency.log_report("Detection latency");
        debug!(
            "Frames submitted: {}, dropped while busy: {}",
            self.frames_submitted, self.frames_dropped
        );
        info!("Calibration session closed with {} images", self.observations.len());
        result
    }
}

impl Drop for CalibrationSession {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            warn!("Calibration session shutdown failed: {err}");
        }
    }
}
